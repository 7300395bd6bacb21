//! Configuration types for vripper-engine

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Forum host and account settings
///
/// These are the values task units consult when deciding whether to act.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ViperConfig {
    /// Base URL of the forum, scheme included (default: "https://vipergirls.to")
    #[serde(default = "default_host")]
    pub host: String,

    /// Log in to the forum before running authenticated actions
    #[serde(default)]
    pub login: bool,

    /// Forum account name
    #[serde(default)]
    pub username: String,

    /// Forum account password
    #[serde(default)]
    pub password: String,

    /// Leave a "thanks" on posts whose galleries are downloaded
    #[serde(default)]
    pub thanks: bool,

    /// Fetch post metadata (poster, alternative titles) (default: true)
    #[serde(default = "default_true")]
    pub fetch_metadata: bool,
}

impl Default for ViperConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            login: false,
            username: String::new(),
            password: String::new(),
            thanks: false,
            fetch_metadata: true,
        }
    }
}

/// Connection and concurrency settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConnectionConfig {
    /// Maximum number of task units executing at once (default: 12)
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Maximum number of image downloads running against one host (default: 4)
    #[serde(default = "default_max_threads_per_host")]
    pub max_threads_per_host: usize,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            max_threads_per_host: default_max_threads_per_host(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Download destination settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    #[schema(value_type = String)]
    pub download_dir: PathBuf,

    /// Prefix every image with its zero-padded index inside the post
    #[serde(default)]
    pub force_order: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            force_order: false,
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Data storage settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./vripper.db")
    #[serde(default = "default_database_path")]
    #[schema(value_type = String)]
    pub database_path: PathBuf,

    /// Number of event log entries kept; older ones are pruned (default: 1000)
    #[serde(default = "default_max_event_log_size")]
    pub max_event_log_size: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_event_log_size: default_max_event_log_size(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Optional API key expected in the X-Api-Key header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration for the engine
///
/// A `Config` value is also the configuration snapshot handed to task units:
/// it is immutable once published through [`crate::settings::SettingsService`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Forum host and account settings
    #[serde(default)]
    pub viper: ViperConfig,

    /// Connection and concurrency settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Download destination settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for downloads
    #[serde(default)]
    pub retry: RetryConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check the settings that would make every task fail or the pool unusable
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.viper.host)
            .map_err(|e| Error::config("viper.host", format!("invalid host URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(
                "viper.host",
                "host must start with http:// or https://",
            ));
        }
        if self.viper.host.ends_with('/') {
            return Err(Error::config(
                "viper.host",
                "host must not end with a trailing slash",
            ));
        }
        if self.connection.max_concurrent_tasks == 0 {
            return Err(Error::config(
                "connection.max_concurrent_tasks",
                "at least one concurrent task is required",
            ));
        }
        if self.connection.max_threads_per_host == 0 {
            return Err(Error::config(
                "connection.max_threads_per_host",
                "at least one download per host is required",
            ));
        }
        if self.viper.login && self.viper.username.is_empty() {
            return Err(Error::config(
                "viper.username",
                "username is required when login is enabled",
            ));
        }
        Ok(())
    }

    /// Copy of this configuration with secrets blanked out, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.viper.password.is_empty() {
            copy.viper.password = REDACTED.to_string();
        }
        if copy.api.api_key.is_some() {
            copy.api.api_key = Some(REDACTED.to_string());
        }
        copy
    }

    /// Put back secrets from `current` where this configuration still holds
    /// the [`REDACTED`] placeholder
    pub fn restore_secrets(&mut self, current: &Config) {
        if self.viper.password == REDACTED {
            self.viper.password = current.viper.password.clone();
        }
        if self.api.api_key.as_deref() == Some(REDACTED) {
            self.api.api_key = current.api.api_key.clone();
        }
    }
}

/// Placeholder shown instead of secrets
pub const REDACTED: &str = "********";

fn default_host() -> String {
    "https://vipergirls.to".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_tasks() -> usize {
    12
}

fn default_max_threads_per_host() -> usize {
    4
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("vripper-engine/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_database_path() -> PathBuf {
    PathBuf::from("vripper.db")
}

fn default_max_event_log_size() -> usize {
    1000
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Durations are stored as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
