use domain::services::{TrackingConfig, WorkflowConfig};
use serde::Deserialize;
use std::net::SocketAddr;

/// Longest stationary window accepted, ten years of location history.
const MAX_STATIONARY_DAYS: i64 = 3650;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub workflow: WorkflowSettings,
    #[serde(default)]
    pub tracking: TrackingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
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

impl From<&DatabaseConfig> for persistence::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Approval workflow settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSettings {
    /// Approvals needed per review round, frozen into each new request.
    #[serde(default = "default_approval_steps")]
    pub approval_steps: i32,

    /// Refuse approvals for molds reported `moved` within `stationary_days`.
    #[serde(default)]
    pub require_stationary: bool,

    #[serde(default = "default_stationary_days")]
    pub stationary_days: i64,

    #[serde(default = "default_max_append_retries")]
    pub max_append_retries: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            approval_steps: default_approval_steps(),
            require_stationary: false,
            stationary_days: default_stationary_days(),
            max_append_retries: default_max_append_retries(),
        }
    }
}

impl From<&WorkflowSettings> for WorkflowConfig {
    fn from(settings: &WorkflowSettings) -> Self {
        Self {
            approval_steps: settings.approval_steps,
            require_stationary: settings.require_stationary,
            stationary_days: settings.stationary_days,
            max_append_retries: settings.max_append_retries,
        }
    }
}

/// Location tracker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingSettings {
    /// Drift radius in meters for molds without their own threshold.
    #[serde(default = "default_threshold_m")]
    pub default_threshold_m: f64,

    #[serde(default = "default_history_page_size")]
    pub history_page_size: i64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            default_threshold_m: default_threshold_m(),
            history_page_size: default_history_page_size(),
        }
    }
}

impl From<&TrackingSettings> for TrackingConfig {
    fn from(settings: &TrackingSettings) -> Self {
        Self {
            default_threshold_m: settings.default_threshold_m,
            history_page_size: settings.history_page_size,
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
    20
}
fn default_min_connections() -> u32 {
    5
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
fn default_approval_steps() -> i32 {
    2
}
fn default_stationary_days() -> i64 {
    7
}
fn default_max_append_retries() -> u32 {
    3
}
fn default_threshold_m() -> f64 {
    100.0
}
fn default_history_page_size() -> i64 {
    50
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
    /// 3. Environment variables with MT__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("MT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration from embedded defaults plus overrides, without
    /// touching config files.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30
            cors_origins = []

            [database]
            url = ""
            max_connections = 5
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [workflow]
            approval_steps = 2
            require_stationary = false
            stationary_days = 7
            max_append_retries = 3

            [tracking]
            default_threshold_m = 100.0
            history_page_size = 50
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is skipped so tests can build partial configs
        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "MT__DATABASE__URL environment variable must be set".to_string(),
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

        if self.workflow.approval_steps < 1 {
            return Err(ConfigValidationError::InvalidValue(
                "workflow.approval_steps must be at least 1".to_string(),
            ));
        }

        if !(1..=MAX_STATIONARY_DAYS).contains(&self.workflow.stationary_days) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "workflow.stationary_days must be between 1 and {}",
                MAX_STATIONARY_DAYS
            )));
        }

        if shared::validation::validate_drift_threshold(self.tracking.default_threshold_m).is_err()
        {
            return Err(ConfigValidationError::InvalidValue(
                "tracking.default_threshold_m must be between 0 and 50000".to_string(),
            ));
        }

        if !(1..=1000).contains(&self.tracking.history_page_size) {
            return Err(ConfigValidationError::InvalidValue(
                "tracking.history_page_size must be between 1 and 1000".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
