use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OllamaUiError, Result};
use crate::terminal::DEFAULT_HISTORY_LIMIT;

pub const BINARY_ENV: &str = "OLLAMAUI_BINARY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub pull: PullConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub binary: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            binary: "ollama".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub history_limit: usize,
    pub scrollback: usize,
    pub prompt_delay_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            scrollback: 2000,
            prompt_delay_ms: 100,
        }
    }
}

impl TerminalConfig {
    pub fn prompt_delay(&self) -> Duration {
        Duration::from_millis(self.prompt_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullConfig {
    /// How long a finished pull stays visible
    pub linger_ms: u64,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self { linger_ms: 3000 }
    }
}

impl PullConfig {
    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub default_model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: "llama3:latest".to_string(),
        }
    }
}

impl AppConfig {
    /// `<config_dir>/ollamaui/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ollamaui").join("config.json"))
    }

    /// Missing file yields defaults; a malformed one is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| OllamaUiError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(binary) = std::env::var(BINARY_ENV) {
            if !binary.trim().is_empty() {
                self.ollama.binary = binary;
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| OllamaUiError::Config("no config directory on this platform".into()))?;
        self.save_to(&path)?;
        Ok(path)
    }
}
