use chrono::{DateTime, Duration, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

use crate::report::RunStatus;

/// What one fetch-and-persist cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct BatchOutcome {
    fetched: usize,
    saved: usize,
    skipped: usize,
    oldest: Option<DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
}

impl BatchOutcome {
    pub fn new(
        fetched: usize,
        saved: usize,
        skipped: usize,
        oldest: Option<DateTime<Utc>>,
        newest: Option<DateTime<Utc>>,
    ) -> Self {
        return Self {
            fetched,
            saved,
            skipped,
            oldest,
            newest,
        };
    }

    pub fn empty() -> Self {
        return Self::new(0, 0, 0, None, None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue(DateTime<Utc>),
    Stop(RunStatus),
}

/// Cursor and counters of one run, plus the termination policy.
#[derive(Debug, Clone, Getters)]
pub struct ProgressTracker {
    stall_threshold: u32,
    step: Duration,
    target: DateTime<Utc>,
    cursor: DateTime<Utc>,
    pages: u64,
    total_saved: u64,
    total_skipped: u64,
    consecutive_fully_skipped: u32,
}

impl ProgressTracker {
    pub fn new(
        cursor: DateTime<Utc>,
        target: DateTime<Utc>,
        stall_threshold: u32,
    ) -> Self {
        return Self {
            stall_threshold,
            step: Duration::minutes(1),
            target,
            cursor,
            pages: 0,
            total_saved: 0,
            total_skipped: 0,
            consecutive_fully_skipped: 0,
        };
    }

    /// Folds `outcome` into the counters and decides what happens next. A
    /// non-empty page with nothing new counts toward the stall threshold,
    /// however short it is.
    ///
    /// The next cursor is the oldest instant of the page, but never later than
    /// one candle before the current cursor: an upstream that ignores the cursor
    /// and keeps serving the same window still sees the cursor regress, and the
    /// fully skipped pages it produces trip the stall threshold.
    pub fn record(&mut self, outcome: &BatchOutcome) -> Decision {
        self.pages += 1;
        self.total_saved += outcome.saved as u64;
        self.total_skipped += outcome.skipped as u64;

        let Some(oldest) = outcome.oldest else {
            return Decision::Stop(RunStatus::Completed);
        };
        if outcome.saved == 0 {
            self.consecutive_fully_skipped += 1;
        } else {
            self.consecutive_fully_skipped = 0;
        }

        let next = oldest.min(self.cursor - self.step);
        self.cursor = next;

        if next <= self.target {
            return Decision::Stop(RunStatus::Completed);
        }
        if self.consecutive_fully_skipped >= self.stall_threshold {
            return Decision::Stop(RunStatus::AbortedStalled);
        }
        return Decision::Continue(next);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::{report::RunStatus, testing::at};

    use super::{BatchOutcome, Decision, ProgressTracker};

    fn tracker() -> ProgressTracker {
        return ProgressTracker::new(
            chrono::Utc.with_ymd_and_hms(2025, 10, 21, 23, 59, 59).unwrap(),
            at(2022, 12, 7, 0, 0),
            3,
        );
    }

    #[test]
    fn first_page_all_new() {
        let mut tracker = tracker();
        let outcome = BatchOutcome::new(
            200,
            200,
            0,
            Some(at(2025, 10, 21, 23, 56)),
            Some(at(2025, 10, 21, 23, 59)),
        );

        assert_eq!(
            tracker.record(&outcome),
            Decision::Continue(at(2025, 10, 21, 23, 56))
        );
        assert_eq!(*tracker.total_saved(), 200);
        assert_eq!(*tracker.cursor(), at(2025, 10, 21, 23, 56));
        assert_eq!(*tracker.consecutive_fully_skipped(), 0);
    }

    #[test]
    fn repeated_page_stalls() {
        let mut tracker = tracker();
        let repeated = BatchOutcome::new(
            200,
            0,
            200,
            Some(at(2025, 10, 21, 23, 56)),
            Some(at(2025, 10, 21, 23, 59)),
        );

        tracker.record(&BatchOutcome::new(
            200,
            200,
            0,
            Some(at(2025, 10, 21, 23, 56)),
            Some(at(2025, 10, 21, 23, 59)),
        ));
        let mut previous = *tracker.cursor();
        for _ in 0..2 {
            let decision = tracker.record(&repeated);
            let Decision::Continue(cursor) = decision else {
                panic!("expected to continue, got {decision:?}");
            };
            assert!(cursor < previous, "cursor must move strictly backward");
            previous = cursor;
        }
        assert_eq!(
            tracker.record(&repeated),
            Decision::Stop(RunStatus::AbortedStalled)
        );
        assert_eq!(*tracker.total_saved(), 200);
        assert_eq!(*tracker.total_skipped(), 600);
        assert_eq!(*tracker.consecutive_fully_skipped(), 3);
    }

    #[test]
    fn partial_progress_resets_stall_counter() {
        let mut tracker = tracker();
        let skipped = |newest| BatchOutcome::new(200, 0, 200, Some(newest), Some(newest));

        tracker.record(&skipped(at(2025, 10, 21, 20, 0)));
        tracker.record(&skipped(at(2025, 10, 21, 19, 0)));
        assert_eq!(*tracker.consecutive_fully_skipped(), 2);
        tracker.record(&BatchOutcome::new(
            200,
            1,
            199,
            Some(at(2025, 10, 21, 18, 0)),
            Some(at(2025, 10, 21, 18, 0)),
        ));
        assert_eq!(*tracker.consecutive_fully_skipped(), 0);
    }

    #[test]
    fn repeated_short_page_stalls() {
        let mut tracker = tracker();
        let short = BatchOutcome::new(
            50,
            0,
            50,
            Some(at(2025, 10, 21, 23, 10)),
            Some(at(2025, 10, 21, 23, 59)),
        );

        assert!(matches!(tracker.record(&short), Decision::Continue(_)));
        assert!(matches!(tracker.record(&short), Decision::Continue(_)));
        assert_eq!(
            tracker.record(&short),
            Decision::Stop(RunStatus::AbortedStalled)
        );
        assert_eq!(*tracker.total_skipped(), 150);
    }

    #[test]
    fn reaching_target_completes() {
        let mut tracker = tracker();
        let outcome = BatchOutcome::new(
            200,
            200,
            0,
            Some(at(2022, 12, 6, 23, 0)),
            Some(at(2022, 12, 7, 2, 19)),
        );

        assert_eq!(
            tracker.record(&outcome),
            Decision::Stop(RunStatus::Completed)
        );
    }

    #[test]
    fn target_wins_over_stall() {
        let mut tracker =
            ProgressTracker::new(at(2022, 12, 7, 0, 1), at(2022, 12, 7, 0, 0), 1);
        let outcome = BatchOutcome::new(
            200,
            0,
            200,
            Some(at(2022, 12, 7, 0, 0)),
            Some(at(2022, 12, 7, 0, 0)),
        );

        assert_eq!(
            tracker.record(&outcome),
            Decision::Stop(RunStatus::Completed)
        );
    }

    #[test]
    fn empty_page_completes() {
        let mut tracker = tracker();
        let cursor = *tracker.cursor();

        assert_eq!(
            tracker.record(&BatchOutcome::empty()),
            Decision::Stop(RunStatus::Completed)
        );
        assert_eq!(*tracker.cursor(), cursor);
        assert_eq!(*tracker.pages(), 1);
    }
}
