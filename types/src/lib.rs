pub mod market;
pub mod window;

pub use market::Market;
pub use window::Window;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid market: {0}")]
    MarketError(String),

    #[error("Invalid window: {0}")]
    WindowError(String),
}
