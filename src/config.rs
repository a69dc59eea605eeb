//! Configuration management for `Places2Go`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::DashboardError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for `Places2Go`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Backing data files
    #[serde(default)]
    pub data: DataConfig,
    /// In-memory and on-disk cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// External data providers
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backing data file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory holding the dataset files
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    /// Source tag applied when a caller does not give one
    #[serde(default)]
    pub default_source: Option<String>,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of derived results in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of in-memory entries
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    /// Directory for the file cache
    #[serde(default = "default_cache_location")]
    pub location: String,
}

/// External provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub flight_api_key: Option<String>,
    pub flight_base_url: Option<String>,
    /// Flight provider (skyscanner or amadeus)
    #[serde(default = "default_flight_provider")]
    pub flight_provider: String,
    pub weather_api_key: Option<String>,
    pub cost_api_key: Option<String>,
    /// Source tag read from local files when a provider is unavailable
    #[serde(default = "default_fallback_source")]
    pub fallback_source: String,
    #[serde(default = "default_flight_cache_ttl")]
    pub flight_cache_ttl_seconds: u64,
    #[serde(default = "default_weather_cache_ttl")]
    pub weather_cache_ttl_seconds: u64,
    #[serde(default = "default_cost_cache_ttl")]
    pub cost_cache_ttl_seconds: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Log output destination (console, file, both)
    #[serde(default = "default_log_output")]
    pub output: String,
    /// Log file path
    #[serde(default = "default_log_file_path")]
    pub file_path: String,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_max_size() -> usize {
    128
}

fn default_cache_location() -> String {
    ".cache".to_string()
}

fn default_flight_provider() -> String {
    "skyscanner".to_string()
}

fn default_fallback_source() -> String {
    "demo1".to_string()
}

fn default_flight_cache_ttl() -> u64 {
    3600
}

fn default_weather_cache_ttl() -> u64 {
    6 * 3600
}

fn default_cost_cache_ttl() -> u64 {
    30 * 24 * 3600
}

fn default_rate_limit() -> u32 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_file_path() -> String {
    "logs/places2go.log".to_string()
}

const MAX_TTL_SECONDS: u64 = 30 * 24 * 3600;
const MAX_CACHE_ENTRIES: usize = 100_000;
const MAX_RATE_LIMIT: u32 = 1000;

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            default_source: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            max_size: default_cache_max_size(),
            location: default_cache_location(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            flight_api_key: None,
            flight_base_url: None,
            flight_provider: default_flight_provider(),
            weather_api_key: None,
            cost_api_key: None,
            fallback_source: default_fallback_source(),
            flight_cache_ttl_seconds: default_flight_cache_ttl(),
            weather_cache_ttl_seconds: default_weather_cache_ttl(),
            cost_cache_ttl_seconds: default_cost_cache_ttl(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: default_log_output(),
            file_path: default_log_file_path(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl DashboardConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("places2go.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. PLACES2GO_CACHE__TTL_SECONDS
        builder = builder.add_source(
            Environment::with_prefix("PLACES2GO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: DashboardConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("places2go").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.data.dir.as_os_str().is_empty() {
            self.data.dir = default_data_dir();
        }
        if self.data.default_source.as_deref().is_some_and(str::is_empty) {
            self.data.default_source = None;
        }
        if self.cache.ttl_seconds == 0 {
            self.cache.ttl_seconds = default_cache_ttl();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.fetch.flight_provider.is_empty() {
            self.fetch.flight_provider = default_flight_provider();
        }
        if self.fetch.fallback_source.is_empty() {
            self.fetch.fallback_source = default_fallback_source();
        }
        if self.fetch.rate_limit_per_minute == 0 {
            self.fetch.rate_limit_per_minute = default_rate_limit();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.logging.output.is_empty() {
            self.logging.output = default_log_output();
        }
        if self.logging.file_path.is_empty() {
            self.logging.file_path = default_log_file_path();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate provider credentials; every key is optional
    pub fn validate_api_keys(&self) -> Result<()> {
        let keys = [
            ("Flight", &self.fetch.flight_api_key),
            ("Weather", &self.fetch.weather_api_key),
            ("Cost", &self.fetch.cost_api_key),
        ];
        for (name, key) in keys {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                return Err(DashboardError::config(format!(
                    "{name} API key cannot be empty if provided. Either remove it or provide a valid key."
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let ttls = [
            ("Cache TTL", self.cache.ttl_seconds),
            ("Flight cache TTL", self.fetch.flight_cache_ttl_seconds),
            ("Weather cache TTL", self.fetch.weather_cache_ttl_seconds),
            ("Cost cache TTL", self.fetch.cost_cache_ttl_seconds),
        ];
        for (name, ttl) in ttls {
            if ttl > MAX_TTL_SECONDS {
                return Err(DashboardError::config(format!(
                    "{name} cannot exceed {MAX_TTL_SECONDS} seconds (30 days)"
                ))
                .into());
            }
        }

        if self.cache.max_size == 0 || self.cache.max_size > MAX_CACHE_ENTRIES {
            return Err(DashboardError::config(format!(
                "Cache max size must be between 1 and {MAX_CACHE_ENTRIES} entries"
            ))
            .into());
        }

        if self.fetch.rate_limit_per_minute > MAX_RATE_LIMIT {
            return Err(DashboardError::config(format!(
                "Rate limit cannot exceed {MAX_RATE_LIMIT} requests per minute"
            ))
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        check_choice("log level", &self.logging.level, &["error", "warn", "info", "debug", "trace"])?;
        check_choice("log format", &self.logging.format, &["pretty", "json"])?;
        check_choice("log output", &self.logging.output, &["console", "file", "both"])?;
        check_choice("flight provider", &self.fetch.flight_provider, &["skyscanner", "amadeus"])?;

        if let Some(url) = &self.fetch.flight_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DashboardError::config(
                    "Flight API base URL must be a valid HTTP or HTTPS URL",
                )
                .into());
            }
        }

        Ok(())
    }
}

fn check_choice(name: &str, value: &str, valid: &[&str]) -> Result<()> {
    if valid.contains(&value) {
        return Ok(());
    }
    Err(DashboardError::config(format!(
        "Invalid {name} '{value}'. Must be one of: {}",
        valid.join(", ")
    ))
    .into())
}
