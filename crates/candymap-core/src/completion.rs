//! Edge-triggered completion ("victory") detection.
//!
//! The celebration fires when an observed visit count crosses from below the
//! catalog size to the catalog size. Observing a complete state again, or
//! starting a session that is already complete, does not fire.

use serde::Serialize;

/// Progress state of one user's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    InProgress,
    Complete,
}

/// Emitted once when a user visits the last house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub visited: usize,
    pub total: usize,
}

/// Tracks the last observed visit count and fires on the crossing.
#[derive(Debug, Clone)]
pub struct CompletionWatch {
    last_observed: Option<usize>,
    state: Progress,
}

impl Default for CompletionWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionWatch {
    pub fn new() -> Self {
        Self {
            last_observed: None,
            state: Progress::InProgress,
        }
    }

    /// Create a watch whose first observation is already recorded.
    pub fn with_baseline(visited: usize, total: usize) -> Self {
        let mut watch = Self::new();
        watch.observe(visited, total);
        watch
    }

    /// Record a visit count; returns the event if this observation crossed
    /// into completion.
    ///
    /// The first observation only sets the baseline. `Complete` is terminal.
    pub fn observe(&mut self, visited: usize, total: usize) -> Option<CompletionEvent> {
        let previous = self.last_observed.replace(visited);
        let complete = total > 0 && visited >= total;

        if !complete || self.state == Progress::Complete {
            return None;
        }
        self.state = Progress::Complete;

        match previous {
            Some(prev) if prev < total => {
                tracing::info!(visited, total, "all houses visited");
                Some(CompletionEvent { visited, total })
            }
            _ => None,
        }
    }

    pub fn state(&self) -> Progress {
        self.state
    }

    pub fn last_observed(&self) -> Option<usize> {
        self.last_observed
    }
}
