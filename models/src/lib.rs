pub mod candle;
pub mod schema;

pub use candle::Candle;
