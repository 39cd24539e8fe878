//! In-memory doubles of the backfill collaborators, for tests.

use std::{
    collections::{BTreeMap, HashSet},
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use models::{candle::CandleBuilder, Candle};
use rust_decimal::Decimal;
use types::Market;

use crate::{
    source::{CandleSource, FetchError},
    store::{CandleStore, StoreError},
};

pub fn market() -> Market {
    return Market::from_str("KRW-ETH").unwrap();
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    return Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap();
}

pub fn candle(market: &Market, candle_time: DateTime<Utc>) -> Candle {
    let price = Decimal::from(5_000_000 + candle_time.timestamp() % 1000);

    return CandleBuilder::default()
        .market(market.to_string())
        .candle_time(candle_time)
        .open(price)
        .high(price + Decimal::from(500))
        .low(price - Decimal::from(500))
        .close(price)
        .volume(Decimal::from_str("1.25").unwrap())
        .build()
        .unwrap();
}

/// `count` consecutive minute candles ending at `newest`, oldest first.
pub fn minute_history(market: &Market, newest: DateTime<Utc>, count: usize) -> Vec<Candle> {
    return (0..count)
        .rev()
        .map(|i| candle(market, newest - Duration::minutes(i as i64)))
        .collect();
}

/// Newest-first page of `count` candles ending at `newest`.
pub fn page(market: &Market, newest: DateTime<Utc>, count: usize) -> Vec<Candle> {
    let mut page = minute_history(market, newest, count);

    page.reverse();
    return page;
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(String, DateTime<Utc>), Candle>>,
    pub existence_checks: AtomicUsize,
    pub saved_batches: Mutex<Vec<Vec<DateTime<Utc>>>>,
    /// Reads see nothing, so only inserts run into the persisted rows.
    pub blind: bool,
}

impl MemoryStore {
    pub fn with(candles: &[Candle]) -> Self {
        let store = Self::default();

        {
            let mut rows = store.rows.lock().unwrap();
            for candle in candles {
                rows.insert(
                    (candle.market().to_owned(), *candle.candle_time()),
                    candle.clone(),
                );
            }
        }
        return store;
    }

    pub fn blind(candles: &[Candle]) -> Self {
        let mut store = Self::with(candles);

        store.blind = true;
        return store;
    }

    pub fn candles(&self) -> Vec<Candle> {
        return self.rows.lock().unwrap().values().cloned().collect();
    }
}

impl CandleStore for MemoryStore {
    fn existing_timestamps(
        &self,
        market: &Market,
        candidates: &[DateTime<Utc>],
    ) -> Result<HashSet<DateTime<Utc>>, StoreError> {
        self.existence_checks.fetch_add(1, Ordering::SeqCst);
        if self.blind {
            return Ok(HashSet::new());
        }
        let rows = self.rows.lock().unwrap();
        return Ok(candidates
            .iter()
            .filter(|x| rows.contains_key(&(market.to_string(), **x)))
            .copied()
            .collect());
    }

    fn save_all(&self, market: &Market, candles: &[Candle]) -> Result<usize, StoreError> {
        let mut rows = self.rows.lock().unwrap();

        for candle in candles {
            if rows.contains_key(&(market.to_string(), *candle.candle_time())) {
                return Err(StoreError::DuplicateKey(format!(
                    "market={market} candle_time={}",
                    candle.candle_time()
                )));
            }
        }
        for candle in candles {
            rows.insert((market.to_string(), *candle.candle_time()), candle.clone());
        }
        self.saved_batches
            .lock()
            .unwrap()
            .push(candles.iter().map(|x| *x.candle_time()).collect());
        return Ok(candles.len());
    }

    fn oldest_persisted(&self, market: &Market) -> Result<Option<DateTime<Utc>>, StoreError> {
        if self.blind {
            return Ok(None);
        }
        let rows = self.rows.lock().unwrap();
        return Ok(rows
            .keys()
            .filter(|(m, _)| m == market.as_str())
            .map(|(_, t)| *t)
            .min());
    }

    fn newest_persisted(&self, market: &Market) -> Result<Option<DateTime<Utc>>, StoreError> {
        let rows = self.rows.lock().unwrap();
        return Ok(rows
            .keys()
            .filter(|(m, _)| m == market.as_str())
            .map(|(_, t)| *t)
            .max());
    }

    fn count(&self, market: &Market) -> Result<u64, StoreError> {
        let rows = self.rows.lock().unwrap();
        return Ok(rows.keys().filter(|(m, _)| m == market.as_str()).count() as u64);
    }

    fn clear(&self, market: &Market) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();

        rows.retain(|(m, _), _| m != market.as_str());
        return Ok((before - rows.len()) as u64);
    }
}

/// Serves pages out of a fixed history the way the upstream does.
pub struct HistorySource {
    history: Vec<Candle>,
    pub requests: Mutex<Vec<Option<DateTime<Utc>>>>,
    /// Serves the newest page whatever `before` says.
    pub ignore_cursor: bool,
    /// Serves pages oldest-first.
    pub ascending: bool,
    /// Fails the request with this (0-based) index.
    pub fail_at: Option<(usize, FetchError)>,
}

impl HistorySource {
    pub fn new(mut history: Vec<Candle>) -> Self {
        history.sort_by_key(|x| *x.candle_time());
        return Self {
            history,
            requests: Mutex::new(Vec::new()),
            ignore_cursor: false,
            ascending: false,
            fail_at: None,
        };
    }

    pub fn requests(&self) -> Vec<Option<DateTime<Utc>>> {
        return self.requests.lock().unwrap().clone();
    }
}

#[async_trait]
impl CandleSource for HistorySource {
    fn max_page_size(&self) -> u16 {
        return 200;
    }

    async fn fetch_page(
        &self,
        _market: &Market,
        page_size: u16,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, FetchError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(before);
            requests.len() - 1
        };
        if let Some((fail_at, err)) = &self.fail_at {
            if *fail_at == index {
                return Err(err.clone());
            }
        }
        let before = if self.ignore_cursor { None } else { before };
        let mut page: Vec<Candle> = self
            .history
            .iter()
            .rev()
            .filter(|x| before.map_or(true, |before| *x.candle_time() < before))
            .take(usize::from(page_size))
            .cloned()
            .collect();
        if self.ascending {
            page.reverse();
        }
        return Ok(page);
    }
}
