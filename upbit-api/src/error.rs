use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    UrlError(#[from] url::ParseError),

    #[error(transparent)]
    HttpError(#[from] http::Error),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("Upbit responded with status={status} body=[{body}]")]
    StatusError { status: StatusCode, body: String },
}

impl Error {
    /// Whether repeating the same request later may succeed: timeouts, dropped
    /// connections, 5xx responses and rate limiting (429).
    pub fn is_retryable(&self) -> bool {
        return match self {
            Error::StatusError { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Error::ReqwestError(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            }
            _ => false,
        };
    }
}
