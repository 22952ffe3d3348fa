//! Scrapers for the human-readable text the ollama CLI prints

mod list;
mod progress;

use std::sync::OnceLock;

use regex::Regex;

pub use list::{
    family_from_name, parse_details, parse_list, parse_list_report, parse_size_to_bytes, ListReport,
    SkippedRow,
};
pub use progress::{parse_progress, ProgressEstimate, PullStage};

/// Remove CSI escape sequences (colours, cursor movement) from CLI output
pub fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    static CSI: OnceLock<Regex> = OnceLock::new();
    let re = CSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid CSI pattern"));
    re.replace_all(text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_cursor_and_colour_codes() {
        assert_eq!(strip_ansi("\x1b[?25lpulling 5%\x1b[K"), "pulling 5%");
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
