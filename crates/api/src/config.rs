use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use domain::models::TrackerOptions;
use shared::retry::RetryPolicy;
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shared secret for `X-Signature-256` on the ingest endpoint.
    /// Signatures are not checked when unset.
    #[serde(default)]
    pub ingest_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token sent as `Authorization: Bot <token>`.
    pub bot_token: String,

    #[serde(default = "default_discord_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_discord_timeout")]
    pub request_timeout_secs: u64,
}

/// Tracker tuning. Mapped onto [`TrackerOptions`] once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Log retries and swallowed failures at warn/error instead of debug.
    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_threshold_days")]
    pub account_age_threshold_days: i64,

    #[serde(default = "default_threshold_days")]
    pub rejoin_threshold_days: i64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Capacity of the channel between the ingest endpoint and the tracker.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            verbose: false,
            account_age_threshold_days: default_threshold_days(),
            rejoin_threshold_days: default_threshold_days(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl TrackerConfig {
    pub fn to_options(&self) -> TrackerOptions {
        TrackerOptions::default()
            .with_model_name(self.model_name.clone())
            .with_verbose(self.verbose)
            .with_account_age_threshold(chrono::Duration::days(self.account_age_threshold_days))
            .with_rejoin_threshold(chrono::Duration::days(self.rejoin_threshold_days))
            .with_retry_policy(RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ))
    }
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_discord_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_discord_timeout() -> u64 {
    10
}
fn default_model_name() -> String {
    domain::models::DEFAULT_MODEL_NAME.to_string()
}
fn default_threshold_days() -> i64 {
    7
}
fn default_retry_attempts() -> u32 {
    shared::retry::DEFAULT_MAX_ATTEMPTS
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_event_buffer() -> usize {
    1024
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with TRACKER__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("TRACKER").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults so tests do not depend on
    /// files in the working directory. Validation is skipped.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 10
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [discord]
            bot_token = ""
            api_base_url = "https://discord.com/api/v10"
            request_timeout_secs = 10

            [tracker]
            model_name = "invite_joins"
            verbose = false
            account_age_threshold_days = 7
            rejoin_threshold_days = 7
            retry_attempts = 3
            retry_delay_ms = 2000
            event_buffer = 1024
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "TRACKER__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.discord.bot_token.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "TRACKER__DISCORD__BOT_TOKEN environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.tracker.retry_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.tracker.event_buffer == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "event_buffer must be at least 1".to_string(),
            ));
        }

        if self.tracker.account_age_threshold_days < 0 || self.tracker.rejoin_threshold_days < 0 {
            return Err(ConfigValidationError::InvalidValue(
                "thresholds cannot be negative".to_string(),
            ));
        }

        self.tracker
            .to_options()
            .validate()
            .map_err(|e| ConfigValidationError::InvalidValue(e.to_string()))?;

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
