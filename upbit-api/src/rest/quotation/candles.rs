use core::fmt;
use std::{borrow::Cow, ops::Deref};

use derive_builder::Builder;
use derive_getters::Getters;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rest::{endpoint::Endpoint, params::QueryParams};

/// Largest `count` the candles endpoints accept.
pub const MAX_COUNT: u16 = 200;

/// Minute candles strictly older than `to` (newest first). Without `to` the most
/// recent `count` candles are returned.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct MinuteCandles<'a> {
    market: Cow<'a, str>,
    #[builder(default = "MinuteUnit::One")]
    unit: MinuteUnit,
    #[builder(default = "MAX_COUNT")]
    count: u16,
    #[builder(default)]
    to: Option<chrono::DateTime<chrono::Utc>>,
}

impl<'a> MinuteCandlesBuilder<'a> {
    fn validate(&self) -> Result<(), String> {
        if let Some(count) = self.count {
            if count == 0 || count > MAX_COUNT {
                return Err(format!("count={count} must be within 1..={MAX_COUNT}"));
            }
        }
        return Ok(());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinuteUnit {
    One,
    Three,
    Five,
    Ten,
    Fifteen,
    Thirty,
    Sixty,
    TwoHundredForty,
}

impl MinuteUnit {
    pub fn minutes(&self) -> u32 {
        return match self {
            MinuteUnit::One => 1,
            MinuteUnit::Three => 3,
            MinuteUnit::Five => 5,
            MinuteUnit::Ten => 10,
            MinuteUnit::Fifteen => 15,
            MinuteUnit::Thirty => 30,
            MinuteUnit::Sixty => 60,
            MinuteUnit::TwoHundredForty => 240,
        };
    }
}

impl fmt::Display for MinuteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.minutes());
    }
}

impl<'a> Endpoint for MinuteCandles<'a> {
    fn endpoint(&self) -> Cow<'static, str> {
        return format!("v1/candles/minutes/{}", self.unit).into();
    }

    fn params(&self) -> QueryParams {
        let mut params = QueryParams::default();

        params
            .push("market", self.market.deref())
            .push("count", self.count)
            .push_opt(
                "to",
                self.to.map(|x| x.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            );
        return params;
    }
}

#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct MinuteCandle {
    market: String,
    candle_date_time_utc: chrono::NaiveDateTime,
    candle_date_time_kst: chrono::NaiveDateTime,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    opening_price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    high_price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    low_price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    trade_price: Decimal,
    timestamp: i64,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    candle_acc_trade_price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    candle_acc_trade_volume: Decimal,
    unit: u32,
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, str::FromStr};

    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use crate::{
        rest::{
            endpoint::Endpoint,
            query::request_url,
            quotation::candles::{MinuteCandle, MinuteCandlesBuilder, MinuteUnit},
        },
        RestClient,
    };

    #[test]
    fn request_url_carries_cursor() {
        let client = RestClient::public().expect("client should build");
        let request = MinuteCandlesBuilder::default()
            .market(Cow::Borrowed("KRW-ETH"))
            .count(200)
            .to(Some(
                chrono::Utc.with_ymd_and_hms(2025, 10, 21, 14, 56, 0).unwrap(),
            ))
            .build()
            .expect("request should build");
        let url = request_url(&request, &client).expect("url should build");
        let to = url
            .query_pairs()
            .find(|(k, _)| k == "to")
            .map(|(_, v)| v.into_owned());

        assert_eq!(url.path(), "/v1/candles/minutes/1");
        assert_eq!(to.as_deref(), Some("2025-10-21T14:56:00Z"));
        assert_eq!(request.params().get("count"), Some("200"));
        assert_eq!(request.params().get("market"), Some("KRW-ETH"));
    }

    #[test]
    fn request_url_without_cursor() {
        let client = RestClient::public().expect("client should build");
        let request = MinuteCandlesBuilder::default()
            .market(Cow::Borrowed("KRW-ETH"))
            .unit(MinuteUnit::Fifteen)
            .build()
            .expect("request should build");
        let url = request_url(&request, &client).expect("url should build");

        assert_eq!(
            url.as_str(),
            "https://api.upbit.com/v1/candles/minutes/15?market=KRW-ETH&count=200"
        );
    }

    #[test]
    fn count_bounds() {
        MinuteCandlesBuilder::default()
            .market(Cow::Borrowed("KRW-ETH"))
            .count(201)
            .build()
            .expect_err("count > 200 should not be valid");
        MinuteCandlesBuilder::default()
            .market(Cow::Borrowed("KRW-ETH"))
            .count(0)
            .build()
            .expect_err("count == 0 should not be valid");
        MinuteCandlesBuilder::default()
            .market(Cow::Borrowed("KRW-ETH"))
            .count(1)
            .build()
            .expect("count == 1 should be valid");
    }

    #[test]
    fn parse_response() {
        let payload = r#"[{
            "market": "KRW-ETH",
            "candle_date_time_utc": "2025-10-21T14:59:00",
            "candle_date_time_kst": "2025-10-21T23:59:00",
            "opening_price": 5712000.0,
            "high_price": 5715000.0,
            "low_price": 5711000.0,
            "trade_price": 5714000.0,
            "timestamp": 1761058799512,
            "candle_acc_trade_price": 123456789.12345678,
            "candle_acc_trade_volume": 21.61372218,
            "unit": 1
        }]"#;
        let candles: Vec<MinuteCandle> =
            serde_json::from_str(payload).expect("payload should parse");
        let candle = &candles[0];

        assert_eq!(candle.market(), "KRW-ETH");
        assert_eq!(
            candle.candle_date_time_utc().and_utc(),
            chrono::Utc.with_ymd_and_hms(2025, 10, 21, 14, 59, 0).unwrap()
        );
        assert_eq!(*candle.opening_price(), Decimal::from(5712000));
        assert_eq!(
            *candle.candle_acc_trade_volume(),
            Decimal::from_str("21.61372218").unwrap()
        );
        assert_eq!(
            *candle.candle_acc_trade_price(),
            Decimal::from_str("123456789.12345678").unwrap()
        );
    }
}
