use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Process-wide terminal input state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalState {
    pub initialized: bool,
    /// Line currently being composed
    pub current_command: String,
    history: VecDeque<String>,
    history_limit: usize,
}

impl Default for TerminalState {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl TerminalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            initialized: false,
            current_command: String::new(),
            history: VecDeque::new(),
            history_limit: limit.max(1),
        }
    }

    /// Append without de-duplication; the oldest entry goes once the bound is hit
    pub fn push_history(&mut self, command: String) {
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(command);
    }

    pub fn history(&self) -> impl Iterator<Item = &String> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_command(&self) -> Option<&str> {
        self.history.back().map(String::as_str)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit.max(1);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}
