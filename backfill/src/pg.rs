use std::collections::HashSet;

use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::{
    dsl,
    prelude::*,
    r2d2::ConnectionManager,
    result::{DatabaseErrorKind, Error as DieselError},
    PgConnection,
};
use models::{schema::minute_candles, Candle};
use tracing::debug;
use types::Market;

use crate::store::{CandleStore, StoreError};

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub fn init_pg_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    return r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(2))
        .build(manager)
        .context("Creating PgPool");
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        return match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::DuplicateKey(info.message().to_owned())
            }
            err => StoreError::Unavailable(err.to_string()),
        };
    }
}

/// `minute_candles` table behind an r2d2 pool.
#[derive(Clone)]
pub struct PgCandleStore {
    pg_pool: PgPool,
}

impl PgCandleStore {
    pub fn new(pg_pool: PgPool) -> Self {
        return Self { pg_pool };
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, StoreError> {
        return self
            .pg_pool
            .get()
            .map_err(|err| StoreError::Unavailable(format!("Getting connection from pg_pool: {err}")));
    }
}

impl CandleStore for PgCandleStore {
    fn existing_timestamps(
        &self,
        market: &Market,
        candidates: &[DateTime<Utc>],
    ) -> Result<HashSet<DateTime<Utc>>, StoreError> {
        let pg_conn = &mut self.conn()?;
        let existing: Vec<DateTime<Utc>> = minute_candles::table
            .filter(
                minute_candles::market
                    .eq(market.as_str())
                    .and(minute_candles::candle_time.eq_any(candidates.to_vec())),
            )
            .select(minute_candles::candle_time)
            .load(pg_conn)?;

        return Ok(existing.into_iter().collect());
    }

    fn save_all(&self, market: &Market, candles: &[Candle]) -> Result<usize, StoreError> {
        let pg_conn = &mut self.conn()?;
        let inserted = pg_conn.transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(minute_candles::table)
                .values(candles)
                .execute(conn)
        })?;

        debug!(%market, inserted, "Saved minute candles");
        return Ok(inserted);
    }

    fn oldest_persisted(&self, market: &Market) -> Result<Option<DateTime<Utc>>, StoreError> {
        let pg_conn = &mut self.conn()?;

        return Ok(minute_candles::table
            .filter(minute_candles::market.eq(market.as_str()))
            .select(dsl::min(minute_candles::candle_time))
            .get_result::<Option<DateTime<Utc>>>(pg_conn)?);
    }

    fn newest_persisted(&self, market: &Market) -> Result<Option<DateTime<Utc>>, StoreError> {
        let pg_conn = &mut self.conn()?;

        return Ok(minute_candles::table
            .filter(minute_candles::market.eq(market.as_str()))
            .select(dsl::max(minute_candles::candle_time))
            .get_result::<Option<DateTime<Utc>>>(pg_conn)?);
    }

    fn count(&self, market: &Market) -> Result<u64, StoreError> {
        let pg_conn = &mut self.conn()?;
        let total = minute_candles::table
            .filter(minute_candles::market.eq(market.as_str()))
            .count()
            .get_result::<i64>(pg_conn)?;

        return Ok(u64::try_from(total).unwrap_or_default());
    }

    fn clear(&self, market: &Market) -> Result<u64, StoreError> {
        let pg_conn = &mut self.conn()?;
        let removed =
            diesel::delete(minute_candles::table.filter(minute_candles::market.eq(market.as_str())))
                .execute(pg_conn)?;

        return Ok(removed as u64);
    }
}
