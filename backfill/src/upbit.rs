use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use models::{candle::CandleBuilder, Candle};
use rust_decimal::Decimal;
use types::Market;
use upbit_api::{
    rest::{
        query::Query,
        quotation::candles::{MinuteCandle, MinuteCandlesBuilder, MinuteUnit, MAX_COUNT},
    },
    RestClient,
};

use crate::source::{CandleSource, FetchError};

impl From<upbit_api::error::Error> for FetchError {
    fn from(err: upbit_api::error::Error) -> Self {
        if err.is_retryable() {
            return FetchError::Transient(format!("{err:#}"));
        }
        return FetchError::Fatal(format!("{err:#}"));
    }
}

/// Minute candles from the Upbit quotation API.
pub struct UpbitCandleSource {
    client: RestClient,
    unit: MinuteUnit,
}

impl UpbitCandleSource {
    pub fn new(client: RestClient) -> Self {
        return Self {
            client,
            unit: MinuteUnit::One,
        };
    }
}

#[async_trait]
impl CandleSource for UpbitCandleSource {
    fn max_page_size(&self) -> u16 {
        return MAX_COUNT;
    }

    async fn fetch_page(
        &self,
        market: &Market,
        page_size: u16,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, FetchError> {
        let request = MinuteCandlesBuilder::default()
            .market(Cow::Borrowed(market.as_str()))
            .unit(self.unit)
            .count(page_size)
            .to(before)
            .build()
            .map_err(|err| FetchError::Fatal(err.to_string()))?;
        let page: Vec<MinuteCandle> = request.query(&self.client).await?;

        tracing::debug!(
            %market,
            before = ?before,
            fetched = page.len(),
            "Fetched minute candles"
        );
        return page.iter().map(to_candle).collect();
    }
}

fn to_candle(candle: &MinuteCandle) -> Result<Candle, FetchError> {
    let candle_time = candle
        .candle_date_time_utc()
        .and_utc()
        .duration_trunc(TimeDelta::minutes(1))
        .map_err(|err| FetchError::Fatal(format!("candle_date_time_utc: {err}")))?;
    let open = *candle.opening_price();
    let high = *candle.high_price();
    let low = *candle.low_price();
    let close = *candle.trade_price();
    let volume = *candle.candle_acc_trade_volume();

    if [open, high, low, close].iter().any(|x| *x <= Decimal::ZERO)
        || low > open.min(close)
        || high < open.max(close)
        || volume < Decimal::ZERO
    {
        return Err(FetchError::Fatal(format!(
            "inconsistent candle market={} time={candle_time} open={open} high={high} low={low} close={close} volume={volume}",
            candle.market()
        )));
    }
    return CandleBuilder::default()
        .market(candle.market().to_owned())
        .candle_time(candle_time)
        .open(open)
        .high(high)
        .low(low)
        .close(close)
        .volume(volume)
        .build()
        .map_err(|err| FetchError::Fatal(err.to_string()));
}
