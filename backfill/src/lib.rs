pub mod config;
pub mod dedup;
pub mod error;
pub mod lock;
pub mod observer;
pub mod pg;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod source;
pub mod store;
pub mod upbit;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::BackfillError;
pub use pipeline::{Backfill, BackfillSettings, BackfillSettingsBuilder};
pub use report::{FinalReport, ProgressSnapshot, RunStatus};
pub use source::{CandleSource, FetchError};
pub use store::{CandleStore, StoreError, StoreStats};
