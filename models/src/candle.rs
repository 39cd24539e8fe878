use derive_builder::Builder;
use derive_getters::Getters;
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One minute bar. `candle_time` is the bucket start in UTC; together with
/// `market` it is the primary key of `minute_candles`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Queryable,
    Selectable,
    Insertable,
    Builder,
    Getters,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::minute_candles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Candle {
    market: String,
    candle_time: chrono::DateTime<chrono::Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    volume: Decimal,
}
