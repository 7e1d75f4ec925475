//! Polling state machine and report
//!
//! ```text
//! Idle -> Polling(0) -> Polling(1) -> ... -> Polling(n-1) -> Flushing -> Done
//!   \________________________________________________/
//!                shutdown: straight to Flushing
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// What a failed sample does to the polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SampleFailurePolicy {
    /// Drop the sample and keep polling
    #[default]
    #[value(name = "skip")]
    SkipAndContinue,
    /// Stop polling and discard the buffer
    Abort,
}

/// Phase of a polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Nothing fetched yet
    Idle,
    /// Running iteration `iteration` (zero-based)
    Polling {
        /// Current iteration
        iteration: u32,
    },
    /// Writing the buffer
    Flushing,
    /// Buffer written
    Done,
}

/// Drives [`PollPhase`] transitions for `total` iterations.
#[derive(Debug, Clone)]
pub struct PollState {
    phase: PollPhase,
    total: u32,
}

impl PollState {
    /// Idle state for a run of `total` iterations.
    pub fn new(total: u32) -> Self {
        Self {
            phase: PollPhase::Idle,
            total,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Enter the next iteration, returning its index, or `None` once all
    /// iterations have run or the run has left the polling phase.
    pub fn advance(&mut self) -> Option<u32> {
        let next = match self.phase {
            PollPhase::Idle => 0,
            PollPhase::Polling { iteration } => iteration + 1,
            PollPhase::Flushing | PollPhase::Done => return None,
        };
        if next >= self.total {
            return None;
        }
        self.phase = PollPhase::Polling { iteration: next };
        Some(next)
    }

    /// Stop polling and start writing. Valid from `Idle` and `Polling`.
    pub fn flush(&mut self) {
        debug_assert!(matches!(
            self.phase,
            PollPhase::Idle | PollPhase::Polling { .. }
        ));
        self.phase = PollPhase::Flushing;
    }

    /// Mark the buffer as written. Valid from `Flushing`.
    pub fn finish(&mut self) {
        debug_assert_eq!(self.phase, PollPhase::Flushing);
        self.phase = PollPhase::Done;
    }
}

/// Summary of a completed polling run.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    /// Iterations requested
    pub requested: u32,
    /// Samples appended to the buffer
    pub succeeded: u32,
    /// Samples dropped under [`SampleFailurePolicy::SkipAndContinue`]
    pub skipped: u32,
    /// Records in the written array
    pub records: usize,
    /// Whether shutdown ended the run early
    pub cancelled: bool,
    /// File written
    pub path: PathBuf,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Buffer written
    pub finished_at: DateTime<Utc>,
}

impl PollReport {
    /// Empty report for a run starting now.
    pub fn start(requested: u32, path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            requested,
            succeeded: 0,
            skipped: 0,
            records: 0,
            cancelled: false,
            path,
            started_at: now,
            finished_at: now,
        }
    }

    /// Iterations that actually ran.
    pub fn attempted(&self) -> u32 {
        self.succeeded + self.skipped
    }
}
