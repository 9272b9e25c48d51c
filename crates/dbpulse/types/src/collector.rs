//! Collector kinds, their persisted configuration, and run bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ids::RunId;

/// Minimum allowed collector interval in seconds.
pub const MIN_INTERVAL_SECS: u64 = 30;

/// Maximum per-run instance concurrency.
pub const MAX_PARALLEL_DEGREE: usize = 64;

/// One metric category measured across the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorKind {
    Cpu,
    Memory,
    Io,
    Disks,
    Backups,
    AlwaysOn,
    LogChain,
    DatabaseStates,
    CriticalErrors,
    MaintenanceJobs,
    TempdbConfig,
    Autogrowth,
    WaitStats,
}

impl CollectorKind {
    /// Every collector kind in declared order.
    pub const ALL: [CollectorKind; 13] = [
        CollectorKind::Cpu,
        CollectorKind::Memory,
        CollectorKind::Io,
        CollectorKind::Disks,
        CollectorKind::Backups,
        CollectorKind::AlwaysOn,
        CollectorKind::LogChain,
        CollectorKind::DatabaseStates,
        CollectorKind::CriticalErrors,
        CollectorKind::MaintenanceJobs,
        CollectorKind::TempdbConfig,
        CollectorKind::Autogrowth,
        CollectorKind::WaitStats,
    ];

    /// Stable wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorKind::Cpu => "cpu",
            CollectorKind::Memory => "memory",
            CollectorKind::Io => "io",
            CollectorKind::Disks => "disks",
            CollectorKind::Backups => "backups",
            CollectorKind::AlwaysOn => "always_on",
            CollectorKind::LogChain => "log_chain",
            CollectorKind::DatabaseStates => "database_states",
            CollectorKind::CriticalErrors => "critical_errors",
            CollectorKind::MaintenanceJobs => "maintenance_jobs",
            CollectorKind::TempdbConfig => "tempdb_config",
            CollectorKind::Autogrowth => "autogrowth",
            CollectorKind::WaitStats => "wait_stats",
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a collector kind name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown collector kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for CollectorKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        CollectorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

/// Persisted configuration of one collector kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Collector kind (identity).
    pub kind: CollectorKind,

    /// Whether the orchestrator schedules this collector.
    pub enabled: bool,

    /// Run interval in seconds (at least [`MIN_INTERVAL_SECS`]).
    pub interval_secs: u64,

    /// Percentage this category contributes to the final score.
    pub weight: f64,

    /// Maximum number of instances measured concurrently in one run.
    pub parallel_degree: usize,

    /// Score when no rule matches.
    pub baseline_score: f64,

    /// Start of the most recent run.
    pub last_run_at: Option<DateTime<Utc>>,

    /// Instances processed by the most recent run.
    pub last_instances_processed: Option<u32>,

    /// Error text of the most recent failed run, cleared on success.
    pub last_error: Option<String>,
}

impl CollectorConfig {
    /// Record the outcome of a run on the config row.
    pub fn record_run(&mut self, started_at: DateTime<Utc>, processed: u32, error: Option<String>) {
        self.last_run_at = Some(started_at);
        self.last_instances_processed = Some(processed);
        self.last_error = error;
    }
}

/// Partial update of a collector configuration from the admin surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfigUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub parallel_degree: Option<usize>,
    #[serde(default)]
    pub baseline_score: Option<f64>,
}

impl CollectorConfigUpdate {
    /// Apply the update, returning the resulting configuration.
    pub fn apply_to(&self, config: &CollectorConfig) -> CollectorConfig {
        let mut updated = config.clone();
        if let Some(enabled) = self.enabled {
            updated.enabled = enabled;
        }
        if let Some(interval) = self.interval_secs {
            updated.interval_secs = interval;
        }
        if let Some(weight) = self.weight {
            updated.weight = weight;
        }
        if let Some(degree) = self.parallel_degree {
            updated.parallel_degree = degree;
        }
        if let Some(baseline) = self.baseline_score {
            updated.baseline_score = baseline;
        }
        updated
    }
}

/// Lifecycle status of a collector run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What started a collector run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Scheduled,
    Manual,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Scheduled => write!(f, "scheduled"),
            TriggerKind::Manual => write!(f, "manual"),
        }
    }
}

/// One row per collector run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorExecutionLog {
    pub run_id: RunId,
    pub kind: CollectorKind,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub status: RunStatus,
    pub success_count: u32,
    pub error_count: u32,
    pub trigger: TriggerKind,
    pub error: Option<String>,
}

impl CollectorExecutionLog {
    /// Open a new log row in `Running` state.
    pub fn start(kind: CollectorKind, trigger: TriggerKind) -> Self {
        Self {
            run_id: RunId::generate(),
            kind,
            started_at: Utc::now(),
            duration_ms: None,
            status: RunStatus::Running,
            success_count: 0,
            error_count: 0,
            trigger,
            error: None,
        }
    }

    /// Close the row as `Completed`.
    pub fn complete(&mut self, success_count: u32, error_count: u32) {
        if self.finish(RunStatus::Completed) {
            self.success_count = success_count;
            self.error_count = error_count;
        }
    }

    /// Close the row as `Failed`.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.finish(RunStatus::Failed) {
            self.error = Some(error.into());
        }
    }

    // Terminal rows are never reopened.
    fn finish(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = Some(elapsed.num_milliseconds().max(0) as u64);
        self.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_wire_name() {
        for kind in CollectorKind::ALL {
            assert_eq!(kind.as_str().parse::<CollectorKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_kind_parse_accepts_dashes_and_case() {
        assert_eq!(
            "Always-On".parse::<CollectorKind>().unwrap(),
            CollectorKind::AlwaysOn
        );
        assert!("replication".parse::<CollectorKind>().is_err());
    }

    #[test]
    fn test_execution_log_is_terminal_once_finished() {
        let mut log = CollectorExecutionLog::start(CollectorKind::Cpu, TriggerKind::Manual);
        assert_eq!(log.status, RunStatus::Running);

        log.complete(10, 2);
        assert_eq!(log.status, RunStatus::Completed);
        assert_eq!(log.error_count, 2);
        assert!(log.duration_ms.is_some());

        log.fail("late failure");
        assert_eq!(log.status, RunStatus::Completed);
        assert!(log.error.is_none());
    }

    #[test]
    fn test_update_only_touches_provided_fields() {
        let config = CollectorConfig {
            kind: CollectorKind::Io,
            enabled: true,
            interval_secs: 300,
            weight: 10.0,
            parallel_degree: 8,
            baseline_score: 100.0,
            last_run_at: None,
            last_instances_processed: None,
            last_error: None,
        };
        let update = CollectorConfigUpdate {
            enabled: Some(false),
            weight: Some(12.5),
            ..Default::default()
        };

        let updated = update.apply_to(&config);
        assert!(!updated.enabled);
        assert_eq!(updated.weight, 12.5);
        assert_eq!(updated.interval_secs, 300);
    }
}
