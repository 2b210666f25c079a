//! Shared HTTP client, tokio runtime, and error classification.
//!
//! Uses async reqwest internally but presents a sync interface
//! (`SHARED_RUNTIME.handle().block_on(..)`) for rayon workers.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default whole-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum body excerpt carried in error messages
const MAX_ERROR_BODY: usize = 200;

/// Error types for HTTP operations
#[derive(Debug)]
pub enum HttpError {
    /// Server answered with a non-success status
    Status { status: u16, message: String },
    /// Request did not complete within the timeout
    Timeout(String),
    /// Connection or protocol failure before a status was received
    Network(String),
    /// Client could not be constructed
    Client(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, message } if message.is_empty() => write!(f, "HTTP {status}"),
            Self::Status { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Timeout(m) => write!(f, "timeout: {m}"),
            Self::Network(m) => write!(f, "network error: {m}"),
            Self::Client(m) => write!(f, "HTTP client error: {m}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create error from reqwest error, stripping the URL (may carry query secrets)
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        let (is_timeout, is_builder, status) = (e.is_timeout(), e.is_builder(), e.status());
        let message = e.without_url().to_string();
        if is_timeout {
            Self::Timeout(message)
        } else if let Some(status) = status {
            Self::Status {
                status: status.as_u16(),
                message,
            }
        } else if is_builder {
            Self::Client(message)
        } else {
            Self::Network(message)
        }
    }

    /// Build a status error, keeping only a short excerpt of the body
    pub fn status(status: u16, body: &str) -> Self {
        let message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
        Self::Status { status, message }
    }

    /// Transient failures worth retrying: timeouts, network faults, 408 and 5xx.
    ///
    /// 429 is deliberately excluded; rate limiting has its own wait path.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 408 | 500..=599),
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Client(_) => false,
        }
    }
}

/// Build a client with the given whole-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, HttpError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .pool_max_idle_per_host(8)
        .build()
        .map_err(HttpError::from_reqwest)
}

/// Shared tokio runtime for HTTP and warehouse operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});
