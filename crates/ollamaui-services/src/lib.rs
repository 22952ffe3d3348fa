mod chat;
mod models;
mod services;
mod status;
pub mod terminal;

pub use chat::{ChatEvent, ChatService};
pub use models::{ModelEvent, ModelPoll, ModelService};
pub use services::Services;
pub use status::{StatusReport, StatusService};
pub use terminal::{ScreenBuffer, ScreenLine, TerminalSession, Tone};

// Re-export core and runner types for the GUI (GUI should only import from services)
pub use ollamaui_core::{
    format_size, AppAction, AppConfig, AppState, ChatMessage, ChatRole, CommandResult, ModelRecord,
    OllamaUiError, PullProgress,
};
pub use ollamaui_runner::{GenerateOptions, OllamaStatus, SystemInfo};
