use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// Nothing has been run yet (caller-side state)
    #[default]
    Idle,
    /// A process is in flight (caller-side state)
    Running,
    Success,
    Error,
}

/// Outcome of one process invocation.
///
/// `error` is populated exactly when `status` is [`CommandStatus::Error`];
/// the constructors are the only way to build a finished result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn running() -> Self {
        Self {
            status: CommandStatus::Running,
            ..Default::default()
        }
    }

    pub fn success(output: String) -> Self {
        Self {
            status: CommandStatus::Success,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, output: Option<String>) -> Self {
        Self {
            status: CommandStatus::Error,
            output,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == CommandStatus::Error
    }

    pub fn is_running(&self) -> bool {
        self.status == CommandStatus::Running
    }

    pub fn output_or_empty(&self) -> &str {
        self.output.as_deref().unwrap_or("")
    }

    /// Error message, falling back to a generic one for malformed results
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Command failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_set_iff_status_error() {
        let ok = CommandResult::success("hi\n".into());
        assert!(ok.is_success());
        assert!(ok.error.is_none());

        let failed = CommandResult::failure("boom", None);
        assert!(failed.is_error());
        assert_eq!(failed.error_message(), "boom");

        assert!(CommandResult::running().error.is_none());
        assert!(CommandResult::default().error.is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&CommandStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
