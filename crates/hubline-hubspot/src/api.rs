//! HubSpot API client: paginated fetch with rate-limit and transient-error handling

use std::sync::Arc;
use std::time::Duration;

use hubline_core::{Backoff, CancelToken, HttpError, Pause, SHARED_RUNTIME, build_client};

use crate::record::{Page, parse_property_names};
use crate::resource::with_query;

/// Wait applied to a 429 that carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Status line, `Retry-After` header and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

/// Blocking GET with bearer auth. Swapped for scripted transports in tests.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, token: &str) -> Result<RawResponse, HttpError>;
}

/// Production transport on the shared tokio runtime.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, token: &str) -> Result<RawResponse, HttpError> {
        SHARED_RUNTIME.handle().block_on(async {
            let response = self
                .client
                .get(url)
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .send()
                .await
                .map_err(HttpError::from_reqwest)?;
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.map_err(HttpError::from_reqwest)?;
            Ok(RawResponse {
                status,
                retry_after,
                body,
            })
        })
    }
}

/// Why a fetch gave up.
#[derive(Debug)]
pub enum FetchError {
    /// 401: token invalid or expired; never retried
    Auth,
    /// Transient failures outlasted the retry budget
    Transient { attempts: u32, last: HttpError },
    /// Non-retryable HTTP failure (4xx other than 401/429, client errors)
    Http(HttpError),
    /// Success status but the body was not the expected JSON
    Decode(String),
    /// Cancellation requested while waiting
    Cancelled,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth => f.write_str("unauthorized: check the HubSpot access token"),
            Self::Transient { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::Http(e) => write!(f, "{e}"),
            Self::Decode(m) => write!(f, "unexpected response body: {m}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transient { last, .. } => Some(last),
            Self::Http(e) => Some(e),
            Self::Auth | Self::Decode(_) | Self::Cancelled => None,
        }
    }
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Parse `Retry-After` as delay-seconds; HTTP-date and junk yield `None`.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Authenticated HubSpot client with the pipeline's retry policy.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    pause: Arc<dyn Pause>,
    base_url: String,
    token: String,
    backoff: Backoff,
    default_retry_after: Duration,
    cancel: CancelToken,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("base_url", &self.base_url)
            .field("backoff", &self.backoff)
            .field("default_retry_after", &self.default_retry_after)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        pause: Arc<dyn Pause>,
        base_url: impl Into<String>,
        token: impl Into<String>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            transport,
            pause,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            backoff: Backoff::default(),
            default_retry_after: DEFAULT_RETRY_AFTER,
            cancel,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_default_retry_after(mut self, wait: Duration) -> Self {
        self.default_retry_after = wait;
        self
    }

    /// Fetch one page of `endpoint`, continuing from `cursor` when given.
    pub fn fetch_page(&self, endpoint: &str, cursor: Option<&str>) -> Result<Page, FetchError> {
        let path = match cursor {
            Some(after) => with_query(endpoint, "after", after),
            None => endpoint.to_string(),
        };
        let body = self.get(&path)?;
        Page::from_json(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Fetch the names of every property in a property catalogue.
    pub fn fetch_property_names(&self, endpoint: &str) -> Result<Vec<String>, FetchError> {
        let body = self.get(endpoint)?;
        parse_property_names(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GET `path` relative to the base URL, applying the retry policy.
    ///
    /// - 401 fails immediately.
    /// - 429 waits `Retry-After` (or the default) and reissues the identical
    ///   request without consuming an attempt. Only cancellation ends this.
    /// - Transient failures back off exponentially, bounded by `backoff`.
    pub fn get(&self, path: &str) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            log::debug!("GET {path}");

            let failure = match self.transport.get(&url, &self.token) {
                Ok(resp) if (200..300).contains(&resp.status) => return Ok(resp.body),
                Ok(resp) if resp.status == 401 => return Err(FetchError::Auth),
                Ok(resp) if resp.status == 429 => {
                    let wait = parse_retry_after(resp.retry_after.as_deref())
                        .unwrap_or(self.default_retry_after);
                    log::warn!("Rate limited, waiting {}s before retrying", wait.as_secs());
                    self.pause
                        .pause(wait, &self.cancel)
                        .map_err(|_| FetchError::Cancelled)?;
                    continue;
                }
                Ok(resp) => HttpError::status(resp.status, &resp.body),
                Err(e) => e,
            };

            if !failure.is_retryable() {
                return Err(FetchError::Http(failure));
            }
            if !self.backoff.should_retry(attempt) {
                return Err(FetchError::Transient {
                    attempts: attempt + 1,
                    last: failure,
                });
            }
            let delay = self.backoff.delay(attempt);
            attempt += 1;
            log::warn!(
                "Request failed ({failure}), retry {attempt}/{} in {delay:?}",
                self.backoff.max_attempts - 1
            );
            self.pause
                .pause(delay, &self.cancel)
                .map_err(|_| FetchError::Cancelled)?;
        }
    }
}
