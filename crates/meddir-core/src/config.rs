//! Configuration module for meddir.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for meddir.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub content_cache: ContentCacheConfig,
    pub intercept: InterceptConfig,
    pub logging: LoggingConfig,
}

/// Remote authority connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Origin of the remote authority, e.g. `https://records.example.com`.
    pub base_url: String,
    /// Header carrying the authentication token, e.g. `X-CSRF-Token`.
    pub auth_header: Option<String>,
    /// Token sent in `auth_header`. Obtaining it is up to the embedding application.
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
}

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic cycles. `0` disables periodic cycles.
    pub poll_interval_secs: u64,
    /// Delay before the first cycle after startup, in milliseconds.
    pub startup_delay_ms: u64,
    /// Attempts before a pending operation is marked failed.
    pub max_attempts: u32,
    pub backoff: BackoffConfig,
}

/// Optional exponential backoff between automatic push attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub enabled: bool,
    /// Delay after the first failed attempt, in milliseconds.
    pub base_ms: u64,
    /// Upper bound on the delay, in milliseconds.
    pub max_ms: u64,
}

/// Document payload cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentCacheConfig {
    /// Directory holding the cache index and payload files.
    pub dir: PathBuf,
    /// Size ceiling in MiB.
    pub max_size_mb: u64,
    /// Eviction stops once the cache is at or below this share of the ceiling (0-100).
    pub target_percent: u8,
    /// Delay between downloads while priming, in milliseconds.
    pub prime_delay_ms: u64,
}

/// Request interception settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Maximum entries kept in the dynamic (API response) cache.
    pub max_dynamic_entries: usize,
    /// Path of the page served to navigations while offline.
    pub offline_page: String,
    /// Static assets cached up front.
    pub precache: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/meddir/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("meddir")
            .join("config.yaml")
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meddir")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            auth_header: None,
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: data_dir().join("meddir.db"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            startup_delay_ms: 2000,
            max_attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_ms: 5000,
            max_ms: 300_000,
        }
    }
}

impl Default for ContentCacheConfig {
    fn default() -> Self {
        Self {
            dir: data_dir().join("content"),
            max_size_mb: 500,
            target_percent: 80,
            prime_delay_ms: 200,
        }
    }
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            max_dynamic_entries: 50,
            offline_page: "/offline.html".to_string(),
            precache: vec![
                "/".to_string(),
                "/manifest.json".to_string(),
                "/icon.svg".to_string(),
                "/offline.html".to_string(),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Periodic cycle interval, `None` when disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }
}

impl ContentCacheConfig {
    /// Ceiling in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.max_attempts"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        match url::Url::parse(&self.remote.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("unsupported scheme: {}", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("invalid URL: {e}"),
            }),
        }
        if self.remote.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.auth_token.is_some() && self.remote.auth_header.is_none() {
            errors.push(ValidationError {
                field: "remote.auth_header".into(),
                message: "required when auth_token is set".into(),
            });
        }

        // --- sync ---
        if self.sync.max_attempts == 0 {
            errors.push(ValidationError {
                field: "sync.max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.backoff.enabled {
            if self.sync.backoff.base_ms == 0 {
                errors.push(ValidationError {
                    field: "sync.backoff.base_ms".into(),
                    message: "must be greater than 0".into(),
                });
            }
            if self.sync.backoff.max_ms < self.sync.backoff.base_ms {
                errors.push(ValidationError {
                    field: "sync.backoff.max_ms".into(),
                    message: "must not be less than base_ms".into(),
                });
            }
        }

        // --- content_cache ---
        if self.content_cache.max_size_mb == 0 {
            errors.push(ValidationError {
                field: "content_cache.max_size_mb".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.content_cache.target_percent == 0 || self.content_cache.target_percent > 100 {
            errors.push(ValidationError {
                field: "content_cache.target_percent".into(),
                message: format!(
                    "must be between 1 and 100, got {}",
                    self.content_cache.target_percent
                ),
            });
        }

        // --- intercept ---
        if self.intercept.max_dynamic_entries == 0 {
            errors.push(ValidationError {
                field: "intercept.max_dynamic_entries".into(),
                message: "must be greater than 0".into(),
            });
        }
        if !self.intercept.offline_page.starts_with('/') {
            errors.push(ValidationError {
                field: "intercept.offline_page".into(),
                message: "must be an absolute path".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_auth(mut self, header: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.remote.auth_header = Some(header.into());
        self.config.remote.auth_token = Some(token.into());
        self
    }

    // --- store ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.store.database_path = path;
        self
    }

    // --- sync ---

    pub fn sync_poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval_secs = seconds;
        self
    }

    pub fn sync_max_attempts(mut self, attempts: u32) -> Self {
        self.config.sync.max_attempts = attempts;
        self
    }

    pub fn sync_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.config.sync.backoff = BackoffConfig {
            enabled: true,
            base_ms,
            max_ms,
        };
        self
    }

    // --- content_cache ---

    pub fn content_cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.content_cache.dir = dir;
        self
    }

    pub fn content_cache_max_size_mb(mut self, mb: u64) -> Self {
        self.config.content_cache.max_size_mb = mb;
        self
    }

    pub fn content_cache_prime_delay_ms(mut self, ms: u64) -> Self {
        self.config.content_cache.prime_delay_ms = ms;
        self
    }

    // --- intercept ---

    pub fn intercept_max_dynamic_entries(mut self, n: usize) -> Self {
        self.config.intercept.max_dynamic_entries = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
