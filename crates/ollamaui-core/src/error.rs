use thiserror::Error;

#[derive(Error, Debug)]
pub enum OllamaUiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OllamaUiError {
    /// Reject blank user input before any process is spawned
    pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(Self::InvalidInput(format!("{field} must not be empty")));
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, OllamaUiError>;
