use chrono::{DateTime, Utc};
use models::Candle;
use types::Market;

use crate::store::{CandleStore, StoreError};

#[derive(Debug, Default)]
pub struct Deduped {
    /// Candles not yet persisted, in page order.
    pub fresh: Vec<Candle>,
    pub skipped: usize,
}

/// Splits `page` into new and already persisted candles with a single existence
/// query against `store`.
pub fn filter(
    store: &dyn CandleStore,
    market: &Market,
    page: Vec<Candle>,
) -> Result<Deduped, StoreError> {
    if page.is_empty() {
        return Ok(Deduped::default());
    }
    let candidates: Vec<DateTime<Utc>> = page.iter().map(|x| *x.candle_time()).collect();
    let existing = store.existing_timestamps(market, &candidates)?;
    let (known, fresh): (Vec<Candle>, Vec<Candle>) = page
        .into_iter()
        .partition(|x| existing.contains(x.candle_time()));

    return Ok(Deduped {
        fresh,
        skipped: known.len(),
    });
}
