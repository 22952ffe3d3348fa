use std::sync::OnceLock;

use ollamaui_core::{ModelRecord, PartialDetails, UNKNOWN};
use regex::Regex;
use tracing::{debug, warn};

use super::strip_ansi;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

fn size_pattern() -> &'static Regex {
    static SIZE: OnceLock<Regex> = OnceLock::new();
    SIZE.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([A-Za-z]+)\s*$").expect("valid size pattern")
    })
}

fn digest_pattern() -> &'static Regex {
    static DIGEST: OnceLock<Regex> = OnceLock::new();
    DIGEST.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{6,}$").expect("valid digest pattern"))
}

fn parameter_pattern() -> &'static Regex {
    static PARAM: OnceLock<Regex> = OnceLock::new();
    PARAM.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*([BbMmGg])\b").expect("valid parameter pattern"))
}

/// `"4.7 GB"` → bytes. Unknown unit or bad number → 0.
pub fn parse_size_to_bytes(text: &str) -> u64 {
    let Some(caps) = size_pattern().captures(text) else {
        return 0;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return 0;
    };
    let multiplier = match caps[2].to_ascii_uppercase().as_str() {
        "B" => 1.0,
        "KB" => KB,
        "MB" => MB,
        "GB" => GB,
        _ => return 0,
    };
    (value * multiplier).round() as u64
}

/// A `list` row that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based, header included
    pub line_no: usize,
    pub line: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListReport {
    pub records: Vec<ModelRecord>,
    pub skipped: Vec<SkippedRow>,
}

/// Parse `list` output, dropping rows that don't fit the `NAME ID SIZE MODIFIED` layout
pub fn parse_list(raw: &str) -> Vec<ModelRecord> {
    parse_list_report(raw).records
}

/// Like [`parse_list`] but also reports which rows were skipped and why
pub fn parse_list_report(raw: &str) -> ListReport {
    let clean = strip_ansi(raw);
    let mut report = ListReport::default();

    for (idx, line) in clean.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line) {
            Ok(record) => {
                debug!(name = %record.name, size = record.size, "Parsed model row");
                report.records.push(record);
            }
            Err(reason) => {
                warn!(line_no = idx + 1, line, reason = %reason, "Skipping model row");
                report.skipped.push(SkippedRow {
                    line_no: idx + 1,
                    line: line.to_string(),
                    reason,
                });
            }
        }
    }
    report
}

fn parse_row(line: &str) -> Result<ModelRecord, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(format!("expected at least 4 columns, found {}", tokens.len()));
    }
    if !digest_pattern().is_match(tokens[1]) {
        return Err(format!("`{}` is not a digest", tokens[1]));
    }

    // "4.7 GB" normally, but tolerate "4.7GB" in one token
    let (size, rest) = if size_pattern().is_match(tokens[2]) {
        (parse_size_to_bytes(tokens[2]), &tokens[3..])
    } else {
        (parse_size_to_bytes(&format!("{} {}", tokens[2], tokens[3])), &tokens[4..])
    };

    let modified = if rest.is_empty() {
        UNKNOWN.to_string()
    } else {
        rest.join(" ")
    };
    Ok(ModelRecord::new(tokens[0], tokens[1], size, modified))
}

/// Leading alphabetic run of a model name: `"llama3:latest"` → `"llama"`
pub fn family_from_name(name: &str) -> String {
    let prefix: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if prefix.is_empty() {
        UNKNOWN.to_string()
    } else {
        prefix.to_lowercase()
    }
}

/// Text after the first colon, or after the first whitespace run when there is none
fn value_of(line: &str) -> Option<String> {
    let value = match line.split_once(':') {
        Some((_, value)) => value,
        None => line.split_once(char::is_whitespace).map(|(_, v)| v)?,
    };
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn starts_with_any(line: &str, triggers: &[&str]) -> bool {
    triggers.iter().any(|t| line.starts_with(t))
}

/// Scrape model details from `show` output.
///
/// Later matches overwrite earlier ones; fields never seen stay `None`.
pub fn parse_details(raw: &str) -> PartialDetails {
    let clean = strip_ansi(raw);
    let mut details = PartialDetails::default();

    for line in clean.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();

        if starts_with_any(&lower, &["architecture", "family", "model"]) {
            if let Some(value) = value_of(line) {
                details.family = Some(value);
            }
        } else if starts_with_any(&lower, &["parameter", "param"]) {
            let source = value_of(line).unwrap_or_default();
            if let Some(caps) = parameter_pattern().captures(&source) {
                details.parameter_size = Some(format!("{}{}", &caps[1], caps[2].to_ascii_uppercase()));
            }
        } else if starts_with_any(&lower, &["quantization", "quant"]) {
            if let Some(value) = value_of(line) {
                details.quantization_level = Some(value);
            }
        } else if starts_with_any(&lower, &["format", "type"]) {
            if let Some(value) = value_of(line) {
                details.format = Some(value);
            }
        }
    }

    details.families = details.family.clone().map(|f| vec![f]);
    details
}
