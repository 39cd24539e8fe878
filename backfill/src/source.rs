use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::Candle;
use types::Market;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Network failure, timeout, 5xx or rate limiting. Re-running later may succeed.
    #[error("Transient fetch error: {0}")]
    Transient(String),

    /// Malformed response, rejected request or authentication failure.
    #[error("Fatal fetch error: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Largest `page_size` the upstream accepts.
    fn max_page_size(&self) -> u16;

    /// Returns at most `page_size` candles ordered newest-first. With `before`
    /// set, every returned candle must be strictly older than it; without it the
    /// most recent candles are returned.
    async fn fetch_page(
        &self,
        market: &Market,
        page_size: u16,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, FetchError>;
}
