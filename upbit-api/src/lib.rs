pub mod error;
pub mod rest;

pub use rest::client::RestClient;

pub const UPBIT_API_URL: &str = "https://api.upbit.com/";
