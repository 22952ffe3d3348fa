use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Snapshot of one in-flight pull
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullProgress {
    pub model: String,
    pub status: String,
    /// Fraction in 0.0..=1.0
    pub progress: Option<f32>,
    pub completed: bool,
    pub error: Option<String>,
}

impl PullProgress {
    pub fn started(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            status: "Starting pull...".to_string(),
            progress: Some(0.0),
            completed: false,
            error: None,
        }
    }

    pub fn update(model: impl Into<String>, percentage: u8, status: impl Into<String>, completed: bool) -> Self {
        Self {
            model: model.into(),
            status: status.into(),
            progress: Some(f32::from(percentage.min(100)) / 100.0),
            completed,
            error: None,
        }
    }

    pub fn failed(model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            status: "Pull failed".to_string(),
            progress: Some(0.0),
            completed: true,
            error: Some(error.into()),
        }
    }

    pub fn percentage(&self) -> Option<u8> {
        self.progress.map(|p| (p.clamp(0.0, 1.0) * 100.0).round() as u8)
    }

    /// Single terminal line describing this snapshot
    pub fn display_line(&self) -> String {
        match self.percentage() {
            Some(pct) if pct > 0 => format!("Pulling {}: {} ({}%)", self.model, self.status, pct),
            _ => format!("Pulling {}: {}", self.model, self.status),
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedPull {
    progress: PullProgress,
    completed_at: Option<Instant>,
}

/// Active pulls keyed by model name.
///
/// One live entry per model: a second pull of the same name replaces the
/// first. Completed entries stay visible for the linger period and are then
/// dropped by [`PullTracker::prune`].
#[derive(Debug, Clone, Default)]
pub struct PullTracker {
    entries: BTreeMap<String, TrackedPull>,
}

impl PullTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, progress: PullProgress, now: Instant) {
        let completed_at = progress.completed.then_some(now);
        self.entries.insert(
            progress.model.clone(),
            TrackedPull {
                progress,
                completed_at,
            },
        );
    }

    /// Drop completed entries older than `linger`; returns the removed names
    pub fn prune(&mut self, now: Instant, linger: Duration) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, t)| {
                t.completed_at
                    .is_some_and(|done| now.saturating_duration_since(done) >= linger)
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in &expired {
            self.entries.remove(name);
        }
        expired
    }

    pub fn get(&self, model: &str) -> Option<&PullProgress> {
        self.entries.get(model).map(|t| &t.progress)
    }

    pub fn active(&self) -> impl Iterator<Item = &PullProgress> {
        self.entries.values().map(|t| &t.progress)
    }

    pub fn is_pulling(&self, model: &str) -> bool {
        self.get(model).is_some_and(|p| !p.completed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
