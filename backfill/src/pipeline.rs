use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use derive_getters::Getters;
use models::Candle;
use tracing::{debug, error, warn};
use types::{Market, Window};

use crate::{
    dedup,
    error::BackfillError,
    lock::{RunGuard, RunLocks},
    observer::ProgressObserver,
    progress::{BatchOutcome, Decision, ProgressTracker},
    report::{FinalReport, ProgressSnapshot, RunStatus},
    source::{CandleSource, FetchError},
    store::{CandleStore, StoreError, StoreStats},
};

#[derive(Debug, Clone, Builder, Getters)]
pub struct BackfillSettings {
    #[builder(default = "200")]
    page_size: u16,
    /// Consecutive fully skipped pages after which the run is abandoned.
    #[builder(default = "3")]
    stall_threshold: u32,
    /// Pause between two pages, to stay under the upstream rate limit.
    #[builder(default)]
    page_delay: Duration,
}

/// Walks a market's history backward page by page, persisting what the store
/// does not hold yet.
pub struct Backfill {
    source: Arc<dyn CandleSource>,
    store: Arc<dyn CandleStore>,
    observer: Arc<dyn ProgressObserver>,
    locks: RunLocks,
    settings: BackfillSettings,
}

impl Backfill {
    pub fn new(
        source: Arc<dyn CandleSource>,
        store: Arc<dyn CandleStore>,
        observer: Arc<dyn ProgressObserver>,
        settings: BackfillSettings,
    ) -> Result<Self, BackfillError> {
        let max_page_size = source.max_page_size();

        if settings.page_size == 0 || settings.page_size > max_page_size {
            return Err(BackfillError::InvalidSettings(format!(
                "page_size={} must be within 1..={max_page_size}",
                settings.page_size
            )));
        }
        if settings.stall_threshold == 0 {
            return Err(BackfillError::InvalidSettings(
                "stall_threshold must be at least 1".to_owned(),
            ));
        }
        return Ok(Self {
            source,
            store,
            observer,
            locks: RunLocks::default(),
            settings,
        });
    }

    pub fn locks(&self) -> &RunLocks {
        return &self.locks;
    }

    /// Claims `market` for a run. The claim is released when the guard drops.
    pub fn begin(&self, market: &Market) -> Result<RunGuard, BackfillError> {
        return self.locks.acquire(market);
    }

    pub async fn run(&self, market: &Market, window: &Window) -> Result<FinalReport, BackfillError> {
        let guard = self.begin(market)?;

        return Ok(self.run_with(guard, window).await);
    }

    /// Runs the backfill claimed by `guard`. Every failure is reported through
    /// the returned status.
    pub async fn run_with(&self, guard: RunGuard, window: &Window) -> FinalReport {
        let market = guard.market().clone();
        let report = self.execute(&market, window).await;

        self.observer.on_finish(&report);
        drop(guard);
        return report;
    }

    pub fn stats(&self, market: &Market) -> Result<StoreStats, BackfillError> {
        return Ok(self.store.stats(market)?);
    }

    /// Deletes every persisted candle of `market`. Refused while a run is active.
    pub fn clear(&self, market: &Market) -> Result<u64, BackfillError> {
        let _guard = self.begin(market)?;
        let removed = self.store.clear(market)?;

        warn!(%market, removed, "Cleared persisted candles");
        return Ok(removed);
    }

    async fn execute(&self, market: &Market, window: &Window) -> FinalReport {
        let target = window.start();
        let end = window.end_or(Utc::now());
        let cursor = match self.store.oldest_persisted(market) {
            Ok(Some(oldest)) => oldest.min(end),
            Ok(None) => end,
            Err(err) => {
                return FinalReport::not_started(
                    market,
                    RunStatus::AbortedError,
                    end,
                    Some(err.to_string()),
                );
            }
        };
        let mut tracker = ProgressTracker::new(
            cursor,
            target,
            self.settings.stall_threshold,
        );

        self.observer.on_start(market, cursor, target);
        if cursor <= target {
            debug!(%market, %cursor, %target, "Nothing left to backfill");
            return FinalReport::new(market, RunStatus::Completed, &tracker, None);
        }
        loop {
            let before = *tracker.cursor();
            let outcome = match self.step(market, before).await {
                Ok(x) => x,
                Err(err) => {
                    return FinalReport::new(
                        market,
                        abort_status(&err),
                        &tracker,
                        Some(err.to_string()),
                    );
                }
            };
            let decision = tracker.record(&outcome);

            self.observer
                .on_page(&ProgressSnapshot::new(market, &tracker, &outcome));
            match decision {
                Decision::Stop(status) => {
                    return FinalReport::new(market, status, &tracker, None);
                }
                Decision::Continue(_) => {
                    if !self.settings.page_delay.is_zero() {
                        tokio::time::sleep(self.settings.page_delay).await;
                    }
                }
            }
        }
    }

    /// Fetches the page before `before`, then persists its unknown candles.
    async fn step(
        &self,
        market: &Market,
        before: DateTime<Utc>,
    ) -> Result<BatchOutcome, BackfillError> {
        let page = self
            .source
            .fetch_page(market, self.settings.page_size, Some(before))
            .await?;

        self.check_page(market, before, &page)?;
        let fetched = page.len();
        let newest = page.first().map(|x| *x.candle_time());
        let oldest = page.last().map(|x| *x.candle_time());
        let deduped = dedup::filter(self.store.as_ref(), market, page)?;
        let saved = if deduped.fresh.is_empty() {
            0
        } else {
            self.store
                .save_all(market, &deduped.fresh)
                .inspect_err(|err| {
                    if let StoreError::DuplicateKey(_) = err {
                        error!(%market, "Pre-filtered insert hit the unique key: {err}");
                    }
                })?
        };

        return Ok(BatchOutcome::new(
            fetched,
            saved,
            deduped.skipped,
            oldest,
            newest,
        ));
    }

    fn check_page(
        &self,
        market: &Market,
        before: DateTime<Utc>,
        page: &[Candle],
    ) -> Result<(), BackfillError> {
        if page.len() > usize::from(self.settings.page_size) {
            return Err(BackfillError::InvalidPage(format!(
                "{} candles for page_size={}",
                page.len(),
                self.settings.page_size
            )));
        }
        if let Some(candle) = page.iter().find(|x| x.market() != market.as_str()) {
            return Err(BackfillError::InvalidPage(format!(
                "candle of market={} in a page of market={market}",
                candle.market()
            )));
        }
        if let Some(pair) = page
            .windows(2)
            .find(|x| x[0].candle_time() <= x[1].candle_time())
        {
            return Err(BackfillError::InvalidPage(format!(
                "{} followed by {}",
                pair[0].candle_time(),
                pair[1].candle_time()
            )));
        }
        if let Some(newest) = page.first() {
            if *newest.candle_time() >= before {
                warn!(
                    %market,
                    %before,
                    newest = %newest.candle_time(),
                    "Upstream ignored the cursor"
                );
            }
        }
        return Ok(());
    }
}

fn abort_status(err: &BackfillError) -> RunStatus {
    return match err {
        BackfillError::Fetch(FetchError::Transient(_)) | BackfillError::Store(_) => {
            RunStatus::AbortedError
        }
        BackfillError::Fetch(FetchError::Fatal(_))
        | BackfillError::InvalidPage(_)
        | BackfillError::InvalidSettings(_)
        | BackfillError::AlreadyRunning(_) => RunStatus::AbortedFatal,
    };
}
