use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the swinglog service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Monitored source configuration
    pub source: SourceConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Queue configuration
    #[serde(default)]
    pub queue: QueueConfig,
    /// Query API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Which kind of log source is being monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Launch-monitor connector log: timestamped lines carrying a marker
    /// followed by a JSON payload
    LaunchMonitor,
    /// GSPro shot stream: one self-contained JSON document per line
    Gspro,
}

/// Monitored file source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Input shape of the monitored file
    #[serde(default = "default_source_mode")]
    pub mode: SourceMode,
    /// Path to the monitored log file
    pub log_file_path: String,
    /// Polling interval in seconds for change detection
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Marker substrings that identify a swing entry (launch_monitor mode)
    #[serde(default = "default_monitored_entries")]
    pub monitored_entries: Vec<String>,
    /// Payload fields retained from a swing entry (launch_monitor mode)
    #[serde(default = "default_allowed_fields")]
    pub allowed_fields: Vec<String>,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    Mysql,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which storage engine holds the shot table
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// SQLite database file path (sqlite backend)
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    /// MySQL connection URL (mysql backend)
    pub mysql_url: Option<String>,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Handoff queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Bounded channel depth between ingestion and the persistence worker
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

/// Query API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// Default value functions
fn default_service_name() -> String {
    "swinglog".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_source_mode() -> SourceMode {
    SourceMode::LaunchMonitor
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_monitored_entries() -> Vec<String> {
    vec!["GSProConnect: Success".to_string()]
}

fn default_allowed_fields() -> Vec<String> {
    [
        "club",
        "speed",
        "spin_axis",
        "total_spin",
        "hla",
        "vla",
        "club_speed",
        "back_spin",
        "side_spin",
        "path",
        "face_to_target",
        "angle_of_attack",
        "speed_at_impact",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_sqlite_path() -> String {
    "swing.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    256
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from config files and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "swinglog")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/swinglog").required(false))
            .add_source(config::File::with_name("/etc/swinglog/swinglog").required(false))
            // Override with environment variables
            // SWINGLOG__SOURCE__LOG_FILE_PATH -> source.log_file_path
            .add_source(
                config::Environment::with_prefix("SWINGLOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Get the polling interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.source.poll_interval_secs)
    }

    /// Get database connection timeout as Duration
    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.connect_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}
