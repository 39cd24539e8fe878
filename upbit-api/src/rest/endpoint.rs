use std::borrow::Cow;

use http::Method;

use super::params::QueryParams;

pub trait Endpoint {
    fn method(&self) -> Method {
        return Method::GET;
    }

    /// Path relative to the client's base url, without a leading slash.
    fn endpoint(&self) -> Cow<'static, str>;

    fn params(&self) -> QueryParams {
        return QueryParams::default();
    }
}
