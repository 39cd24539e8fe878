use types::Market;

use crate::{source::FetchError, store::StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error("A backfill for market={0} is already running")]
    AlreadyRunning(Market),

    #[error("Upstream page violates the newest-first contract: {0}")]
    InvalidPage(String),

    #[error("Invalid backfill settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
