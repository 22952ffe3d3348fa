//! Application state store - the single owner of everything the view renders

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{ModelRecord, PartialDetails, PullProgress, PullTracker, TerminalState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub waiting: bool,
    pub error: Option<String>,
}

/// Every mutation of [`AppState`] goes through one of these
#[derive(Debug, Clone)]
pub enum AppAction {
    SetLoading(bool),
    SetError(Option<String>),
    SetModels(Vec<ModelRecord>),
    RemoveModel(String),
    UpdateDetails { name: String, details: PartialDetails },
    SetTerminalInitialized(bool),
    SetCurrentCommand(String),
    AddToHistory(String),
    PullProgress(PullProgress),
    SelectChatModel(String),
    ChatPrompt(String),
    ChatResponse(String),
    ChatFailed(String),
    ClearChat,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub models: Vec<ModelRecord>,
    pub loading: bool,
    pub error: Option<String>,
    pub terminal: TerminalState,
    pub pulls: PullTracker,
    pub chat: ChatSession,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            terminal: TerminalState::with_history_limit(limit),
            ..Default::default()
        }
    }

    pub fn apply(&mut self, action: AppAction) {
        self.apply_at(action, Instant::now());
    }

    pub fn apply_at(&mut self, action: AppAction, now: Instant) {
        match action {
            AppAction::SetLoading(loading) => self.loading = loading,
            AppAction::SetError(error) => self.error = error,
            AppAction::SetModels(models) => self.models = models,
            AppAction::RemoveModel(name) => self.models.retain(|m| m.name != name),
            AppAction::UpdateDetails { name, details } => {
                if let Some(model) = self.models.iter_mut().find(|m| m.name == name) {
                    model.details.merge(details);
                }
            }
            AppAction::SetTerminalInitialized(value) => self.terminal.initialized = value,
            AppAction::SetCurrentCommand(command) => self.terminal.current_command = command,
            AppAction::AddToHistory(command) => self.terminal.push_history(command),
            AppAction::PullProgress(progress) => self.pulls.apply(progress, now),
            AppAction::SelectChatModel(model) => self.chat.model = model,
            AppAction::ChatPrompt(prompt) => {
                self.chat.messages.push(ChatMessage {
                    role: ChatRole::User,
                    content: prompt,
                });
                self.chat.waiting = true;
                self.chat.error = None;
            }
            AppAction::ChatResponse(content) => {
                self.chat.messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content,
                });
                self.chat.waiting = false;
            }
            AppAction::ChatFailed(error) => {
                self.chat.error = Some(error);
                self.chat.waiting = false;
            }
            AppAction::ClearChat => {
                self.chat.messages.clear();
                self.chat.error = None;
            }
        }
    }

    /// Remove finished pulls whose linger period has elapsed
    pub fn prune_pulls(&mut self, now: Instant, linger: Duration) -> Vec<String> {
        self.pulls.prune(now, linger)
    }

    pub fn model_by_name(&self, name: &str) -> Option<&ModelRecord> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn total_size(&self) -> u64 {
        self.models.iter().map(|m| m.size).sum()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}
