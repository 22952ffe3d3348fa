use std::sync::mpsc::{channel, Receiver, TryRecvError};

use ollamaui_core::{AppAction, AppState, OllamaUiError, Result};
use ollamaui_runner::{GenerateOptions, OllamaCli};
use tokio::runtime::Handle;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Reply(String),
    Failed(String),
}

/// Stateless chat controller; each prompt is a fresh one-shot `run`
#[derive(Debug, Clone)]
pub struct ChatService {
    cli: OllamaCli,
    handle: Handle,
}

impl ChatService {
    pub fn new(cli: OllamaCli, handle: Handle) -> Self {
        Self { cli, handle }
    }

    pub fn select_model(state: &mut AppState, model: impl Into<String>) {
        state.apply(AppAction::SelectChatModel(model.into()));
    }

    /// Send `prompt` to the selected model
    #[instrument(skip(self, state, prompt), fields(model = %state.chat.model))]
    pub fn send(&self, state: &mut AppState, prompt: &str) -> Result<Receiver<ChatEvent>> {
        self.generate(state, prompt, None)
    }

    /// Like [`send`](Self::send) with sampling options passed as CLI flags
    pub fn generate(
        &self,
        state: &mut AppState,
        prompt: &str,
        options: Option<GenerateOptions>,
    ) -> Result<Receiver<ChatEvent>> {
        let model = state.chat.model.trim().to_string();
        OllamaUiError::require_non_empty("model name", &model)?;
        OllamaUiError::require_non_empty("prompt", prompt)?;
        let prompt = prompt.trim().to_string();
        state.apply(AppAction::ChatPrompt(prompt.clone()));

        let (tx, rx) = channel();
        let cli = self.cli.clone();
        self.handle.spawn(async move {
            let reply = match options {
                Some(options) => cli.generate(&model, &prompt, &options).await,
                None => cli.chat_with_model(&model, &prompt).await,
            };
            let event = match reply {
                Ok(text) => ChatEvent::Reply(text),
                Err(e) => ChatEvent::Failed(e.to_string()),
            };
            let _ = tx.send(event);
        });
        Ok(rx)
    }

    pub fn poll(state: &mut AppState, rx: &mut Option<Receiver<ChatEvent>>) {
        let Some(receiver) = rx.take() else { return };

        loop {
            match receiver.try_recv() {
                Ok(ChatEvent::Reply(text)) => {
                    debug!(chars = text.len(), "Chat reply");
                    state.apply(AppAction::ChatResponse(text));
                }
                Ok(ChatEvent::Failed(e)) => state.apply(AppAction::ChatFailed(e)),
                Err(TryRecvError::Empty) => {
                    *rx = Some(receiver);
                    break;
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn clear(state: &mut AppState) {
        state.apply(AppAction::ClearChat);
    }
}
