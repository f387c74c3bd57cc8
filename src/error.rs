use thiserror::Error;

/// Failure fetching the search-results page. Non-fatal: the cycle is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
}

/// Terminal outcome of a notification that was not delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The listing cannot be sent at all; no request was made.
    #[error("invalid listing {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("webhook still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// The webhook answered with a non-2xx status other than 429.
    #[error("webhook rejected the message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never produced an HTTP response.
    #[error("webhook transport failed: {reason}")]
    Transport { reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seen store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("seen store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("seen store database error: {0}")]
    Sqlite(#[from] sqlx::Error),
}

/// Raised only while building an extractor from configuration.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector \"{selector}\": {reason}")]
    Selector { selector: String, reason: String },

    #[error("invalid pattern for listing path \"{listing_path}\": {source}")]
    Pattern {
        listing_path: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
