use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use redis::Commands;
use serde::Serialize;
use tracing::{error, info, warn};
use types::{Market, Window};

use crate::report::{FinalReport, ProgressSnapshot, RunStatus};

pub const PROGRESS_CHANNEL: &str = "backfill-progress";

pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _market: &Market, _cursor: DateTime<Utc>, _target: DateTime<Utc>) {}

    fn on_page(&self, snapshot: &ProgressSnapshot);

    fn on_finish(&self, _report: &FinalReport) {}
}

/// Structured log lines, one summary every `every` pages and a warning for
/// each page that brought nothing new.
pub struct LogObserver {
    every: u64,
}

impl LogObserver {
    pub fn new(every: u64) -> Self {
        return Self {
            every: every.max(1),
        };
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        return Self::new(10);
    }
}

impl ProgressObserver for LogObserver {
    fn on_start(&self, market: &Market, cursor: DateTime<Utc>, target: DateTime<Utc>) {
        info!(%market, %cursor, %target, "Backfill started");
    }

    fn on_page(&self, snapshot: &ProgressSnapshot) {
        let batch = snapshot.last_batch();

        if snapshot.pages() % self.every == 0 {
            info!(
                market = %snapshot.market(),
                pages = snapshot.pages(),
                total_saved = snapshot.total_saved(),
                saved = batch.saved(),
                skipped = batch.skipped(),
                cursor = %snapshot.cursor(),
                "Backfill progress"
            );
        } else if *snapshot.consecutive_fully_skipped() > 0 {
            warn!(
                market = %snapshot.market(),
                page = snapshot.pages(),
                skipped = batch.skipped(),
                consecutive = snapshot.consecutive_fully_skipped(),
                "Every candle of the page was already persisted"
            );
        }
    }

    fn on_finish(&self, report: &FinalReport) {
        match report.status() {
            RunStatus::Completed => info!(
                market = %report.market(),
                total_saved = report.total_saved(),
                total_skipped = report.total_skipped(),
                pages = report.pages(),
                final_cursor = %report.final_cursor(),
                "Backfill completed"
            ),
            RunStatus::AbortedStalled => warn!(
                market = %report.market(),
                total_saved = report.total_saved(),
                final_cursor = %report.final_cursor(),
                "Backfill stalled, upstream keeps serving already persisted candles"
            ),
            status => error!(
                market = %report.market(),
                ?status,
                total_saved = report.total_saved(),
                final_cursor = %report.final_cursor(),
                error = report.error().as_deref().unwrap_or_default(),
                "Backfill aborted"
            ),
        }
    }
}

#[derive(Debug, Clone, Getters, Serialize)]
pub struct RunProgress {
    running: bool,
    cursor: DateTime<Utc>,
    target: DateTime<Utc>,
    latest: Option<ProgressSnapshot>,
    report: Option<FinalReport>,
}

/// Latest progress of every market, for the control surface.
#[derive(Debug, Clone, Default)]
pub struct ProgressBoard {
    runs: Arc<RwLock<HashMap<Market, RunProgress>>>,
}

impl ProgressBoard {
    pub fn get(&self, market: &Market) -> Option<RunProgress> {
        return self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(market)
            .cloned();
    }

    /// Shows `market` as running before its task is scheduled, replacing the
    /// report of any earlier run. The run refines the cursor once it starts.
    pub fn mark_requested(&self, market: &Market, window: &Window) {
        self.on_start(market, window.end_or(Utc::now()), window.start());
    }
}

impl ProgressObserver for ProgressBoard {
    fn on_start(&self, market: &Market, cursor: DateTime<Utc>, target: DateTime<Utc>) {
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                market.clone(),
                RunProgress {
                    running: true,
                    cursor,
                    target,
                    latest: None,
                    report: None,
                },
            );
    }

    fn on_page(&self, snapshot: &ProgressSnapshot) {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(run) = runs.get_mut(snapshot.market()) {
            run.cursor = *snapshot.cursor();
            run.latest = Some(snapshot.clone());
        }
    }

    fn on_finish(&self, report: &FinalReport) {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let run = runs
            .entry(report.market().clone())
            .or_insert_with(|| RunProgress {
                running: false,
                cursor: *report.final_cursor(),
                target: *report.final_cursor(),
                latest: None,
                report: None,
            });

        run.running = false;
        run.cursor = *report.final_cursor();
        run.report = Some(report.clone());
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ProgressMessage<'a> {
    Start {
        market: &'a Market,
        cursor: DateTime<Utc>,
        target: DateTime<Utc>,
    },
    Page(&'a ProgressSnapshot),
    Finish(&'a FinalReport),
}

pub fn init_redis_pool(redis_url: &str) -> anyhow::Result<r2d2::Pool<redis::Client>> {
    let redis_client = redis::Client::open(redis_url)?;

    return r2d2::Pool::builder()
        .max_size(4)
        .build(redis_client)
        .context("Creating RedisPool");
}

/// Publishes every observation as JSON on a redis channel.
pub struct RedisPublisher {
    pool: r2d2::Pool<redis::Client>,
    channel: String,
}

impl RedisPublisher {
    pub fn new(pool: r2d2::Pool<redis::Client>) -> Self {
        return Self {
            pool,
            channel: PROGRESS_CHANNEL.to_owned(),
        };
    }

    fn publish(&self, message: &ProgressMessage) -> anyhow::Result<()> {
        let mut redis_conn = self
            .pool
            .get()
            .context("Getting connection from redis_pool")?;
        let json_message =
            serde_json::to_string(message).context("Stringify backfill progress message")?;
        let _: () = redis_conn
            .publish(&self.channel, json_message)
            .context(format!("Publishing to redis {} channel", self.channel))?;
        return Ok(());
    }

    fn publish_or_log(&self, message: &ProgressMessage) {
        if let Err(err) = self.publish(message) {
            error!("{err:#}");
        }
    }
}

impl ProgressObserver for RedisPublisher {
    fn on_start(&self, market: &Market, cursor: DateTime<Utc>, target: DateTime<Utc>) {
        self.publish_or_log(&ProgressMessage::Start {
            market,
            cursor,
            target,
        });
    }

    fn on_page(&self, snapshot: &ProgressSnapshot) {
        self.publish_or_log(&ProgressMessage::Page(snapshot));
    }

    fn on_finish(&self, report: &FinalReport) {
        self.publish_or_log(&ProgressMessage::Finish(report));
    }
}

/// Forwards every observation to each inner observer, in order.
#[derive(Default, Clone)]
pub struct Fanout {
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl Fanout {
    pub fn with(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        return self;
    }
}

impl ProgressObserver for Fanout {
    fn on_start(&self, market: &Market, cursor: DateTime<Utc>, target: DateTime<Utc>) {
        for observer in self.observers.iter() {
            observer.on_start(market, cursor, target);
        }
    }

    fn on_page(&self, snapshot: &ProgressSnapshot) {
        for observer in self.observers.iter() {
            observer.on_page(snapshot);
        }
    }

    fn on_finish(&self, report: &FinalReport) {
        for observer in self.observers.iter() {
            observer.on_finish(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        progress::{BatchOutcome, ProgressTracker},
        report::{FinalReport, ProgressSnapshot, RunStatus},
        testing::{at, market},
    };
    use types::Window;

    use super::{Fanout, LogObserver, ProgressBoard, ProgressObserver};

    #[test]
    fn board_follows_a_run() {
        let market = market();
        let board = ProgressBoard::default();
        let observer = Fanout::default()
            .with(Arc::new(LogObserver::default()))
            .with(Arc::new(board.clone()));
        let mut tracker =
            ProgressTracker::new(at(2025, 10, 21, 15, 0), at(2025, 10, 1, 0, 0), 3);

        assert!(board.get(&market).is_none());
        observer.on_start(&market, *tracker.cursor(), *tracker.target());
        assert!(*board.get(&market).unwrap().running());

        let outcome = BatchOutcome::new(
            200,
            200,
            0,
            Some(at(2025, 10, 21, 11, 40)),
            Some(at(2025, 10, 21, 14, 59)),
        );
        tracker.record(&outcome);
        observer.on_page(&ProgressSnapshot::new(&market, &tracker, &outcome));
        let progress = board.get(&market).unwrap();
        assert_eq!(*progress.cursor(), at(2025, 10, 21, 11, 40));
        assert_eq!(*progress.latest().as_ref().unwrap().total_saved(), 200);

        observer.on_finish(&FinalReport::new(
            &market,
            RunStatus::AbortedError,
            &tracker,
            Some("boom".to_owned()),
        ));
        let progress = board.get(&market).unwrap();
        assert!(!progress.running());
        assert_eq!(
            *progress.report().as_ref().unwrap().status(),
            RunStatus::AbortedError
        );
    }

    #[test]
    fn requested_run_replaces_the_previous_report() {
        let market = market();
        let board = ProgressBoard::default();
        let tracker = ProgressTracker::new(at(2025, 10, 21, 15, 0), at(2025, 10, 1, 0, 0), 3);

        board.on_finish(&FinalReport::new(
            &market,
            RunStatus::Completed,
            &tracker,
            None,
        ));
        let window = Window::new(at(2025, 10, 20, 0, 0), Some(at(2025, 10, 21, 0, 0))).unwrap();
        board.mark_requested(&market, &window);

        let progress = board.get(&market).unwrap();
        assert!(*progress.running());
        assert!(progress.report().is_none());
        assert_eq!(*progress.cursor(), at(2025, 10, 21, 0, 0));
        assert_eq!(*progress.target(), at(2025, 10, 20, 0, 0));
    }
}
