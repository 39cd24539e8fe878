pub mod client;
pub mod endpoint;
pub mod params;
pub mod query;
pub mod quotation;
