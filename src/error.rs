use thiserror::Error;

/// Recoverable failures inside the market-data feed layer.
///
/// A feed error never tears down the stream. The offending update is dropped,
/// the last good state is retained, and the error is surfaced alongside it so
/// consumers can show a degraded indicator.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Bad orderbook level: {0}")]
    BadLevel(String),

    #[error("Bad trade: {0}")]
    BadTrade(String),

    #[error("Stream closed")]
    Closed,
}

/// Error surface of the GoDark REST APIs (trading backend and the auxiliary
/// service endpoints).
///
/// Non-2xx responses carry a JSON body `{code, message, timestamp}` which is
/// surfaced verbatim as `Service`. Transport failures map onto the remaining
/// variants. This layer never retries; callers decide.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("GoDark API error {code}: {message}")]
    Service {
        code: i64,
        message: String,
        timestamp: Option<String>,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Response decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Connection(_) | ApiError::Timeout(_))
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Service { .. } => "service_error",
            ApiError::Connection(_) => "connection_error",
            ApiError::Timeout(_) => "timeout",
            ApiError::Decode(_) => "decode_error",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout("request to the API timed out".to_string())
        } else if err.is_connect() {
            ApiError::Connection(format!("failed to reach the API: {}", err))
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;
pub type ApiResult<T> = std::result::Result<T, ApiError>;
