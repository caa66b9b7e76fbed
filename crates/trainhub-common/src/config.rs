//! Configuration for TrainHub

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `TRAINHUB__DATABASE__URL`
const ENV_PREFIX: &str = "TRAINHUB";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Outbound SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Delivery scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Phishing simulation platform configuration
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Operator admin endpoint configuration
    #[serde(default)]
    pub admin: AdminConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public hostname, used in Message-IDs
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend (only "postgres" is supported)
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

/// Outbound SMTP relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Relay username
    pub username: Option<String>,

    /// Relay password
    pub password: Option<String>,

    /// Use implicit TLS
    #[serde(default)]
    pub use_tls: bool,

    /// Use STARTTLS
    #[serde(default = "default_use_starttls")]
    pub use_starttls: bool,

    /// Envelope and header sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Display name for the sender
    pub from_name: Option<String>,

    /// Per-send timeout in seconds
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: false,
            use_starttls: default_use_starttls(),
            from_address: default_from_address(),
            from_name: None,
            timeout_secs: default_smtp_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_use_starttls() -> bool {
    true
}

fn default_from_address() -> String {
    "no-reply@localhost".to_string()
}

fn default_smtp_timeout() -> u64 {
    30
}

/// Delivery scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Start the timer at boot
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Interval of the scheduled-email sweep, in seconds
    #[serde(default = "default_email_interval")]
    pub email_interval_secs: u64,

    /// Interval of the simulation-launch sweep, in seconds
    #[serde(default = "default_simulation_interval")]
    pub simulation_interval_secs: u64,

    /// Interval of the session/token cleanup, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Maximum records processed concurrently within one sweep
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Maximum due records fetched per sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            email_interval_secs: default_email_interval(),
            simulation_interval_secs: default_simulation_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            concurrency_limit: default_concurrency_limit(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_email_interval() -> u64 {
    60
}

fn default_simulation_interval() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    86_400
}

fn default_concurrency_limit() -> usize {
    4
}

fn default_batch_size() -> i64 {
    100
}

/// Phishing simulation platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Base URL of the campaign platform API
    #[serde(default = "default_launcher_url")]
    pub launcher_url: String,

    /// Bearer token for the campaign platform
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_launcher_timeout")]
    pub timeout_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            launcher_url: default_launcher_url(),
            api_key: None,
            timeout_secs: default_launcher_timeout(),
        }
    }
}

fn default_launcher_url() -> String {
    "http://localhost:3333/api".to_string()
}

fn default_launcher_timeout() -> u64 {
    10
}

/// Operator admin endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Serve the admin endpoint
    #[serde(default = "default_admin_enabled")]
    pub enabled: bool,

    /// Bind address; keep it on a private interface
    #[serde(default = "default_admin_bind")]
    pub bind: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: default_admin_enabled(),
            bind: default_admin_bind(),
        }
    }
}

fn default_admin_enabled() -> bool {
    true
}

fn default_admin_bind() -> String {
    "127.0.0.1:9090".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the first existing default location, then
    /// apply `TRAINHUB__SECTION__KEY` environment overrides
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/trainhub/config.toml"),
        ];

        let file = paths.into_iter().find(|p| p.exists());
        Self::load_layered(file.as_deref())
    }

    /// Load configuration from an optional file plus environment overrides
    pub fn load_layered(file: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|raw| raw.try_deserialize::<Config>())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))
    }
}
