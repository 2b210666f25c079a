//! Pipeline configuration, built by the CLI and threaded through every component

use std::path::PathBuf;
use std::time::Duration;

use hubline_core::{Backoff, DEFAULT_REQUEST_TIMEOUT};

use crate::api::DEFAULT_RETRY_AFTER;
use crate::loader::DEFAULT_BATCH_SIZE;
use crate::resource::Resource;

pub const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";
pub const DEFAULT_STATE_PATH: &str = "hubspot_state.json";

/// HubSpot connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub access_token: String,
    pub timeout: Duration,
}

/// Fetch retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts per request for transient failures
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Wait for a 429 without a usable `Retry-After`
    pub default_retry_after: Duration,
}

impl RetryConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.max_retries, self.base_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            max_retries: backoff.max_attempts,
            base_delay: backoff.base_delay,
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }
}

/// Runtime configuration for a pull run
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub batch_size: usize,
    pub state_path: PathBuf,
    pub resources: Vec<Resource>,
}

impl Config {
    /// Configuration with defaults for everything but the token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                access_token: access_token.into(),
                timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            retry: RetryConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            resources: vec![Resource::contacts()],
        }
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.api.access_token.trim().is_empty(),
            "HubSpot access token is not set (HUBSPOT_PRIVATE_TOKEN or [hubspot].access_token)"
        );
        anyhow::ensure!(
            self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"),
            "Invalid HubSpot base URL: {}",
            self.api.base_url
        );
        anyhow::ensure!(self.batch_size > 0, "batch_size must be at least 1");
        anyhow::ensure!(self.retry.max_retries > 0, "max_retries must be at least 1");
        anyhow::ensure!(!self.resources.is_empty(), "No resources configured");

        let mut seen = std::collections::HashSet::new();
        for r in &self.resources {
            anyhow::ensure!(!r.name.trim().is_empty(), "Resource with empty name");
            anyhow::ensure!(
                r.endpoint.starts_with('/'),
                "Resource {}: endpoint must start with '/': {}",
                r.name,
                r.endpoint
            );
            anyhow::ensure!(seen.insert(r.name.as_str()), "Duplicate resource: {}", r.name);
        }
        Ok(())
    }

    /// Keep only the named resources, in the order given.
    pub fn select_resources(&mut self, names: &[String]) -> anyhow::Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let r = self
                .resources
                .iter()
                .find(|r| &r.name == name)
                .ok_or_else(|| anyhow::anyhow!("Unknown resource: {name}"))?;
            selected.push(r.clone());
        }
        self.resources = selected;
        Ok(())
    }
}
