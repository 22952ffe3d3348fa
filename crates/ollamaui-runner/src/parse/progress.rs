use std::sync::OnceLock;

use regex::Regex;

use super::strip_ansi;

/// Which phase of a pull a line of output belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStage {
    Manifest,
    Downloading,
    Verifying,
    WritingManifest,
    Success,
    /// An explicit `NN%` marker
    Percent,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEstimate {
    pub percentage: u8,
    pub status: String,
    pub stage: PullStage,
}

impl ProgressEstimate {
    pub fn is_complete(&self) -> bool {
        self.stage == PullStage::Success
    }
}

// Checked in order against the lowercased last line
const TRIGGERS: &[(&str, u8, &str, PullStage)] = &[
    ("pulling manifest", 5, "Pulling manifest...", PullStage::Manifest),
    ("downloading", 10, "Downloading...", PullStage::Downloading),
    ("verifying", 90, "Verifying...", PullStage::Verifying),
    ("writing manifest", 95, "Writing manifest...", PullStage::WritingManifest),
    ("success", 100, "Success", PullStage::Success),
];

fn percent_pattern() -> &'static Regex {
    static PERCENT: OnceLock<Regex> = OnceLock::new();
    PERCENT.get_or_init(|| Regex::new(r"(\d+)\s*%").expect("valid percent pattern"))
}

/// Last `NN%` marker on the line, clamped to 100
fn last_percentage(line: &str) -> Option<u8> {
    let caps = percent_pattern().captures_iter(line).last()?;
    let value: u64 = caps[1].parse().unwrap_or(u64::MAX);
    Some(value.min(100) as u8)
}

/// Estimate pull progress from the CLI's text output.
///
/// Returns `None` for blank input.
pub fn parse_progress(text: &str) -> Option<ProgressEstimate> {
    let clean = strip_ansi(text);
    let lines: Vec<&str> = clean
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let last = *lines.last()?;

    if let Some((line, pct)) = lines
        .iter()
        .rev()
        .find_map(|line| last_percentage(line).map(|pct| (*line, pct)))
    {
        return Some(ProgressEstimate {
            percentage: pct,
            status: line.to_string(),
            stage: PullStage::Percent,
        });
    }

    let lower = last.to_lowercase();
    let estimate = TRIGGERS
        .iter()
        .find(|(trigger, ..)| lower.contains(trigger))
        .map(|&(_, percentage, status, stage)| ProgressEstimate {
            percentage,
            status: status.to_string(),
            stage,
        })
        .unwrap_or_else(|| ProgressEstimate {
            percentage: 0,
            status: last.to_string(),
            stage: PullStage::Unrecognized,
        });
    Some(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_percentage_wins() {
        let est = parse_progress("...downloading 42%\n").unwrap();
        assert_eq!(est.percentage, 42);
        assert_eq!(est.status, "...downloading 42%");
        assert_eq!(est.stage, PullStage::Percent);
    }

    #[test]
    fn trigger_table_on_last_line() {
        let est = parse_progress("pulling manifest\nverifying sha256 digest").unwrap();
        assert_eq!(est.percentage, 90);
        assert_eq!(est.status, "Verifying...");

        let est = parse_progress("writing manifest").unwrap();
        assert_eq!((est.percentage, est.stage), (95, PullStage::WritingManifest));

        let est = parse_progress("SUCCESS").unwrap();
        assert!(est.is_complete());
        assert_eq!(est.percentage, 100);
    }

    #[test]
    fn percentage_found_on_earlier_line() {
        let est = parse_progress("pulling abc 37%\nverifying sha256 digest").unwrap();
        assert_eq!(est.percentage, 37);
        assert_eq!(est.status, "pulling abc 37%");
    }

    #[test]
    fn last_marker_on_a_line_wins_and_is_clamped() {
        assert_eq!(parse_progress("10% then 20%").unwrap().percentage, 20);
        assert_eq!(parse_progress("weird 250%").unwrap().percentage, 100);
    }

    #[test]
    fn carriage_return_redraws_are_lines() {
        let est = parse_progress("pulling 1%\rpulling 2%\rpulling 3%").unwrap();
        assert_eq!(est.percentage, 3);
    }

    #[test]
    fn unknown_text_is_zero_with_raw_status() {
        let est = parse_progress("  something else  ").unwrap();
        assert_eq!(est.percentage, 0);
        assert_eq!(est.status, "something else");
        assert_eq!(est.stage, PullStage::Unrecognized);
    }

    #[test]
    fn blank_input_is_none() {
        assert!(parse_progress("").is_none());
        assert!(parse_progress(" \n\r\n ").is_none());
    }

    #[test]
    fn escape_codes_are_ignored() {
        let est = parse_progress("\x1b[?25lpulling 6a0746a1ec1a... 64%\x1b[K").unwrap();
        assert_eq!(est.percentage, 64);
        assert_eq!(est.status, "pulling 6a0746a1ec1a... 64%");
    }
}
