//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hubline_hubspot::Resource;
use hubline_hubspot::config::{DEFAULT_BASE_URL, DEFAULT_STATE_PATH};
use hubline_warehouse::BigQueryConfig;
use serde::Deserialize;

/// Environment variable holding the HubSpot private app token
pub const TOKEN_ENV: &str = "HUBSPOT_PRIVATE_TOKEN";

/// Global configuration for hubline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub hubspot: HubSpotConfig,
    pub retry: RetryConfig,
    pub warehouse: WarehouseConfig,
    pub state: StateConfig,
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubSpotConfig {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: std::env::var(TOKEN_ENV).ok(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub default_retry_after_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            default_retry_after_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub project_id: Option<String>,
    pub dataset_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub credentials_file: Option<String>,
    pub batch_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            dataset_id: None,
            credentials_file: None,
            batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STATE_PATH),
        }
    }
}

/// `[[resources]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub properties_endpoint: Option<String>,
}

impl From<&ResourceConfig> for Resource {
    fn from(r: &ResourceConfig) -> Self {
        let resource = Resource::new(&r.name, &r.endpoint);
        match &r.properties_endpoint {
            Some(p) => resource.with_properties_endpoint(p),
            None => resource,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./hubline.toml (current directory)
    /// 2. ~/.config/hubline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("hubline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "hubline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resources to pull; the built-in contacts resource when none are configured.
    pub fn resources(&self) -> Vec<Resource> {
        if self.resources.is_empty() {
            vec![Resource::contacts()]
        } else {
            self.resources.iter().map(Resource::from).collect()
        }
    }

    /// Pipeline settings with everything resolved from this file.
    pub fn pipeline(&self) -> hubline_hubspot::Config {
        let mut config = hubline_hubspot::Config::new(
            self.hubspot.access_token.clone().unwrap_or_default(),
        );
        config.api.base_url = self.hubspot.base_url.clone();
        config.api.timeout = Duration::from_secs(self.hubspot.timeout_secs);
        config.retry.max_retries = self.retry.max_retries;
        config.retry.base_delay = Duration::from_millis(self.retry.base_delay_ms);
        config.retry.default_retry_after = Duration::from_secs(self.retry.default_retry_after_secs);
        config.batch_size = self.warehouse.batch_size;
        config.state_path = self.state.path.clone();
        config.resources = self.resources();
        config
    }

    /// BigQuery destination; project and dataset are required.
    pub fn bigquery(&self) -> Result<BigQueryConfig> {
        let project_id = self
            .warehouse
            .project_id
            .clone()
            .filter(|s| !s.is_empty())
            .context("[warehouse].project_id is not set")?;
        let dataset_id = self
            .warehouse
            .dataset_id
            .clone()
            .filter(|s| !s.is_empty())
            .context("[warehouse].dataset_id is not set")?;
        Ok(BigQueryConfig {
            project_id,
            dataset_id,
            credentials_file: self.warehouse.credentials_file.as_ref().map(PathBuf::from),
        })
    }
}
