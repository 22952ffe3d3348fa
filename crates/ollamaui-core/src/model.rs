use serde::{Deserialize, Serialize};

/// Placeholder for any detail field the CLI output did not provide
pub const UNKNOWN: &str = "Unknown";

/// One row of the local model inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    pub digest: String,
    /// Size in bytes
    pub size: u64,
    /// Display string as printed by the CLI ("2 weeks ago", "3 days ago", ...)
    pub modified_at: String,
    pub details: ModelDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDetails {
    pub format: String,
    pub family: String,
    pub families: Vec<String>,
    pub parameter_size: String,
    pub quantization_level: String,
}

impl Default for ModelDetails {
    fn default() -> Self {
        Self {
            format: UNKNOWN.to_string(),
            family: UNKNOWN.to_string(),
            families: Vec::new(),
            parameter_size: UNKNOWN.to_string(),
            quantization_level: UNKNOWN.to_string(),
        }
    }
}

/// Fields scraped from `show` output; `None` means the field was not found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub families: Option<Vec<String>>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

impl PartialDetails {
    pub fn is_empty(&self) -> bool {
        self.format.is_none()
            && self.family.is_none()
            && self.families.is_none()
            && self.parameter_size.is_none()
            && self.quantization_level.is_none()
    }
}

impl ModelDetails {
    /// Overlay whatever was parsed on top of the current values
    pub fn merge(&mut self, partial: PartialDetails) {
        if let Some(format) = partial.format {
            self.format = format;
        }
        if let Some(family) = partial.family {
            self.family = family;
        }
        if let Some(families) = partial.families {
            self.families = families;
        }
        if let Some(size) = partial.parameter_size {
            self.parameter_size = size;
        }
        if let Some(quant) = partial.quantization_level {
            self.quantization_level = quant;
        }
    }
}

impl ModelRecord {
    pub fn new(
        name: impl Into<String>,
        digest: impl Into<String>,
        size: u64,
        modified_at: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            digest: digest.into(),
            size,
            modified_at: modified_at.into(),
            details: ModelDetails::default(),
        }
    }
}

/// Human readable size using the same 1024 multipliers the list parser uses
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        return format!("{} B", bytes);
    }
    format!("{:.1} {}", value, UNITS[unit])
}
