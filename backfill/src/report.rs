use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use types::Market;

use crate::progress::{BatchOutcome, ProgressTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Reached the target instant or ran out of upstream history.
    Completed,
    /// Too many consecutive pages contained nothing new.
    AbortedStalled,
    /// The upstream rejected the request or broke the page contract.
    AbortedFatal,
    /// Transient upstream failure or store failure. Re-running resumes.
    AbortedError,
}

#[derive(Debug, Clone, Getters, Serialize)]
pub struct ProgressSnapshot {
    market: Market,
    pages: u64,
    total_saved: u64,
    total_skipped: u64,
    cursor: DateTime<Utc>,
    target: DateTime<Utc>,
    consecutive_fully_skipped: u32,
    last_batch: BatchOutcome,
}

impl ProgressSnapshot {
    pub fn new(market: &Market, tracker: &ProgressTracker, last_batch: &BatchOutcome) -> Self {
        return Self {
            market: market.clone(),
            pages: *tracker.pages(),
            total_saved: *tracker.total_saved(),
            total_skipped: *tracker.total_skipped(),
            cursor: *tracker.cursor(),
            target: *tracker.target(),
            consecutive_fully_skipped: *tracker.consecutive_fully_skipped(),
            last_batch: last_batch.clone(),
        };
    }
}

#[derive(Debug, Clone, Getters, Serialize)]
pub struct FinalReport {
    market: Market,
    status: RunStatus,
    total_saved: u64,
    total_skipped: u64,
    pages: u64,
    final_cursor: DateTime<Utc>,
    error: Option<String>,
}

impl FinalReport {
    pub fn new(
        market: &Market,
        status: RunStatus,
        tracker: &ProgressTracker,
        error: Option<String>,
    ) -> Self {
        return Self {
            market: market.clone(),
            status,
            total_saved: *tracker.total_saved(),
            total_skipped: *tracker.total_skipped(),
            pages: *tracker.pages(),
            final_cursor: *tracker.cursor(),
            error,
        };
    }

    /// A run that never got to fetch, e.g. because the resume point could not be read.
    pub fn not_started(
        market: &Market,
        status: RunStatus,
        cursor: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        return Self {
            market: market.clone(),
            status,
            total_saved: 0,
            total_skipped: 0,
            pages: 0,
            final_cursor: cursor,
            error,
        };
    }

    pub fn is_complete(&self) -> bool {
        return self.status == RunStatus::Completed;
    }

    /// Whether running the same backfill again may make further progress.
    pub fn is_resumable(&self) -> bool {
        return matches!(
            self.status,
            RunStatus::AbortedError | RunStatus::AbortedStalled
        );
    }
}
