//! Configuration for dbpulse-daemon

use dbpulse_scoring::ConsolidationConfig;
use dbpulse_types::MonitoredInstance;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Consolidation boundaries and caps
    #[serde(default)]
    pub scoring: ConsolidationConfig,

    /// Static instance inventory
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Start collector timers when the daemon starts
    #[serde(default = "default_true")]
    pub autostart: bool,

    /// Consolidation interval in seconds
    #[serde(default = "default_consolidation_interval")]
    pub consolidation_interval_secs: u64,

    /// Upper bound on one instance measurement in seconds
    #[serde(default = "default_measurement_timeout")]
    pub measurement_timeout_secs: u64,

    /// How long shutdown waits for in-flight runs in seconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            consolidation_interval_secs: default_consolidation_interval(),
            measurement_timeout_secs: default_measurement_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl SchedulerConfig {
    pub fn consolidation_interval(&self) -> Duration {
        Duration::from_secs(self.consolidation_interval_secs.max(1))
    }

    pub fn measurement_timeout(&self) -> Duration {
        Duration::from_secs(self.measurement_timeout_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Static inventory and simulated sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Monitored instances
    #[serde(default)]
    pub instances: Vec<MonitoredInstance>,

    /// Probability that a simulated reading is degraded (0.0-1.0)
    #[serde(default = "default_degraded_ratio")]
    pub degraded_ratio: f64,

    /// Probability that a simulated measurement fails (0.0-1.0)
    #[serde(default = "default_failure_ratio")]
    pub failure_ratio: f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            instances: vec![
                MonitoredInstance::new("SQLPROD01", "sqlprod01.local"),
                MonitoredInstance::new("SQLPROD02", "sqlprod02.local"),
                MonitoredInstance::new("SQLDEV01", "sqldev01.local"),
            ],
            degraded_ratio: default_degraded_ratio(),
            failure_ratio: default_failure_ratio(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_consolidation_interval() -> u64 {
    300
}

fn default_measurement_timeout() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_degraded_ratio() -> f64 {
    0.1
}

fn default_failure_ratio() -> f64 {
    0.02
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then optional file, then `DBPULSE_*` env
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Nested keys use a double underscore: DBPULSE_SCHEDULER__AUTOSTART
        builder = builder.add_source(
            config::Environment::with_prefix("DBPULSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.inventory.instances.len(), 3);
        assert!(config.scoring.validate().is_ok());
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.consolidation_interval(), Duration::from_secs(300));
        assert_eq!(config.measurement_timeout(), Duration::from_secs(30));
        assert!(config.autostart);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.scoring.boundaries.healthy, 85.0);
        assert_eq!(config.scheduler.shutdown_grace_secs, 30);
    }
}
