//! dbpulse daemon library
//!
//! This module provides the core components of the dbpulse daemon:
//! - Collector runs against the monitored inventory
//! - Single-flight scheduling of the 13 collectors
//! - Periodic consolidation into final health scores
//! - Storage backends and the REST configuration surface

pub mod admin;
pub mod api;
pub mod collectors;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;
pub mod storage;

pub use admin::{AdminService, CollectorUpdate};
pub use config::DaemonConfig;
pub use error::{AdminError, ApiError, CollectorError, DaemonError, OrchestratorError, StorageError};
pub use scheduler::{CollectorOrchestrator, HealthConsolidator};
pub use server::Server;
pub use storage::{InMemoryStorage, PostgresStorage, Storage};
