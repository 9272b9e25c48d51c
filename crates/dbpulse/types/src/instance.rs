//! Monitored instance inventory entries
//!
//! The inventory itself is external; these are the fields the engine reads.

use serde::{Deserialize, Serialize};

use crate::collector::CollectorKind;
use crate::ids::ServerName;

/// A database server instance known to the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredInstance {
    /// Instance name (identity)
    pub server: ServerName,

    /// Host name or address
    pub host: String,

    /// Listener port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment label (e.g. `production`)
    #[serde(default)]
    pub environment: Option<String>,

    /// Whether the instance is monitored at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Collectors allowed to measure this instance; `None` means all
    #[serde(default)]
    pub collectors: Option<Vec<CollectorKind>>,
}

fn default_port() -> u16 {
    1433
}

fn default_enabled() -> bool {
    true
}

impl MonitoredInstance {
    pub fn new(server: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            server: ServerName::new(server),
            host: host.into(),
            port: default_port(),
            environment: None,
            enabled: true,
            collectors: None,
        }
    }

    /// Whether `kind` should measure this instance.
    pub fn is_eligible_for(&self, kind: CollectorKind) -> bool {
        self.enabled
            && self
                .collectors
                .as_ref()
                .map_or(true, |allowed| allowed.contains(&kind))
    }
}
