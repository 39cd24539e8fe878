use std::collections::HashSet;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use models::Candle;
use serde::Serialize;
use types::Market;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// An insert hit the (market, candle_time) key. Inserts are pre-filtered, so
    /// this always points at a bug upstream of the store.
    #[error("Duplicate candle on insert: {0}")]
    DuplicateKey(String),

    #[error("Candle store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize)]
pub struct StoreStats {
    market: Market,
    total: u64,
    oldest: Option<DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
}

/// Durable candle storage keyed by (market, candle_time). Calls block the
/// current thread.
pub trait CandleStore: Send + Sync {
    /// Subset of `candidates` already persisted for `market`, in one query.
    fn existing_timestamps(
        &self,
        market: &Market,
        candidates: &[DateTime<Utc>],
    ) -> Result<HashSet<DateTime<Utc>>, StoreError>;

    /// Persists every candle or none of them.
    fn save_all(&self, market: &Market, candles: &[Candle]) -> Result<usize, StoreError>;

    fn oldest_persisted(&self, market: &Market) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn newest_persisted(&self, market: &Market) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn count(&self, market: &Market) -> Result<u64, StoreError>;

    /// Deletes every candle of `market`, returning how many were removed.
    fn clear(&self, market: &Market) -> Result<u64, StoreError>;

    fn stats(&self, market: &Market) -> Result<StoreStats, StoreError> {
        return Ok(StoreStats {
            market: market.clone(),
            total: self.count(market)?,
            oldest: self.oldest_persisted(market)?,
            newest: self.newest_persisted(market)?,
        });
    }
}
