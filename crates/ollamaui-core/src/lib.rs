pub mod command;
pub mod config;
pub mod error;
pub mod model;
pub mod pull;
pub mod state;
pub mod terminal;

pub use command::{CommandResult, CommandStatus};
pub use config::{AppConfig, ChatConfig, OllamaConfig, PullConfig, TerminalConfig};
pub use error::{OllamaUiError, Result};
pub use model::{format_size, ModelDetails, ModelRecord, PartialDetails, UNKNOWN};
pub use pull::{PullProgress, PullTracker};
pub use state::{AppAction, AppState, ChatMessage, ChatRole, ChatSession};
pub use terminal::TerminalState;
