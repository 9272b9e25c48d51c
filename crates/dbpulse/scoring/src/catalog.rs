//! Collector catalog.
//!
//! Static registration table mapping every [`CollectorKind`] to its metric
//! groups, shipped default rules, default scheduling settings and supported
//! exception labels. Resetting a collector's rules restores what is listed
//! here.

use dbpulse_types::{
    CollectorConfig, CollectorKind, ComparisonOp, RuleAction, ThresholdRule,
};
use serde::Serialize;

use crate::error::{ScoringError, ScoringResult};

/// One metric group sampled by a collector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricGroup {
    /// Group name used by rules and measurements.
    pub name: &'static str,

    /// Unit of the reading.
    pub unit: &'static str,

    /// Reading of a healthy instance.
    pub nominal: f64,

    /// Reading of a badly degraded instance.
    pub degraded: f64,
}

/// Static description of one collector kind.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorDefinition {
    pub kind: CollectorKind,
    pub display_name: &'static str,
    pub groups: &'static [MetricGroup],
    pub default_interval_secs: u64,
    pub default_weight: f64,
    pub default_parallel_degree: usize,
    pub exception_kinds: &'static [&'static str],
}

impl CollectorDefinition {
    /// Initial persisted configuration for this collector.
    pub fn default_config(&self) -> CollectorConfig {
        CollectorConfig {
            kind: self.kind,
            enabled: true,
            interval_secs: self.default_interval_secs,
            weight: self.default_weight,
            parallel_degree: self.default_parallel_degree,
            baseline_score: 100.0,
            last_run_at: None,
            last_instances_processed: None,
            last_error: None,
        }
    }

    pub fn supports_exception_kind(&self, label: &str) -> bool {
        self.exception_kinds.contains(&label)
    }
}

const fn group(name: &'static str, unit: &'static str, nominal: f64, degraded: f64) -> MetricGroup {
    MetricGroup {
        name,
        unit,
        nominal,
        degraded,
    }
}

const CPU_GROUPS: &[MetricGroup] = &[
    group("Utilization", "percent", 35.0, 100.0),
    group("SignalWait", "percent", 5.0, 40.0),
];

const MEMORY_GROUPS: &[MetricGroup] = &[
    group("PageLifeExpectancy", "seconds", 3000.0, 50.0),
    group("MemoryGrantsPending", "count", 0.0, 10.0),
];

const IO_GROUPS: &[MetricGroup] = &[
    group("ReadLatencyMs", "ms", 5.0, 80.0),
    group("WriteLatencyMs", "ms", 3.0, 80.0),
];

const DISK_GROUPS: &[MetricGroup] = &[
    group("FreeSpacePercent", "percent", 45.0, 2.0),
];

const BACKUP_GROUPS: &[MetricGroup] = &[
    group("HoursSinceFullBackup", "hours", 12.0, 400.0),
    group("HoursSinceLogBackup", "hours", 0.5, 48.0),
];

const ALWAYS_ON_GROUPS: &[MetricGroup] = &[
    group("UnhealthyReplicas", "count", 0.0, 3.0),
    group("SendQueueMb", "mb", 0.0, 4096.0),
];

const LOG_CHAIN_GROUPS: &[MetricGroup] = &[
    group("BrokenChains", "count", 0.0, 2.0),
];

const DATABASE_STATE_GROUPS: &[MetricGroup] = &[
    group("OfflineDatabases", "count", 0.0, 2.0),
    group("SuspectDatabases", "count", 0.0, 1.0),
];

const CRITICAL_ERROR_GROUPS: &[MetricGroup] = &[
    group("SevereErrorsLast24h", "count", 0.0, 30.0),
];

const MAINTENANCE_JOB_GROUPS: &[MetricGroup] = &[
    group("FailedJobs", "count", 0.0, 5.0),
    group("DaysSinceIntegrityCheck", "days", 2.0, 30.0),
];

const TEMPDB_GROUPS: &[MetricGroup] = &[
    group("DataFileCountDeviation", "count", 0.0, 6.0),
    group("UnevenFileSizes", "flag", 0.0, 1.0),
];

const AUTOGROWTH_GROUPS: &[MetricGroup] = &[
    group("PercentGrowthFiles", "count", 0.0, 8.0),
    group("EventsLast24h", "count", 2.0, 120.0),
];

const WAIT_STAT_GROUPS: &[MetricGroup] = &[
    group("SignalWaitPercent", "percent", 8.0, 45.0),
    group("PageIoLatchMs", "ms", 2.0, 40.0),
];

/// Label accepted by every collector.
pub const PLANNED_MAINTENANCE: &str = "planned_maintenance";

/// Look up the definition of a collector kind.
pub fn definition(kind: CollectorKind) -> CollectorDefinition {
    use CollectorKind::*;

    let (display_name, groups, interval, weight, degree, exception_kinds): (
        &'static str,
        &'static [MetricGroup],
        u64,
        f64,
        usize,
        &'static [&'static str],
    ) = match kind {
        Cpu => (
            "CPU",
            CPU_GROUPS,
            300,
            10.0,
            16,
            &[PLANNED_MAINTENANCE, "batch_window"],
        ),
        Memory => (
            "Memory",
            MEMORY_GROUPS,
            300,
            10.0,
            16,
            &[PLANNED_MAINTENANCE],
        ),
        Io => (
            "I/O",
            IO_GROUPS,
            300,
            8.0,
            16,
            &[PLANNED_MAINTENANCE, "slow_storage_tier"],
        ),
        Disks => (
            "Disks",
            DISK_GROUPS,
            900,
            10.0,
            16,
            &[PLANNED_MAINTENANCE, "archive_volume"],
        ),
        Backups => (
            "Backups",
            BACKUP_GROUPS,
            3600,
            12.0,
            8,
            &[
                PLANNED_MAINTENANCE,
                "no_full_backup_required",
                "no_log_backup_required",
                "backups_managed_externally",
            ],
        ),
        AlwaysOn => (
            "Always On",
            ALWAYS_ON_GROUPS,
            300,
            8.0,
            16,
            &[PLANNED_MAINTENANCE, "not_in_availability_group"],
        ),
        LogChain => (
            "Log Chain",
            LOG_CHAIN_GROUPS,
            3600,
            6.0,
            8,
            &[PLANNED_MAINTENANCE, "simple_recovery_expected"],
        ),
        DatabaseStates => (
            "Database States",
            DATABASE_STATE_GROUPS,
            300,
            10.0,
            16,
            &[PLANNED_MAINTENANCE, "decommissioning"],
        ),
        CriticalErrors => (
            "Critical Errors",
            CRITICAL_ERROR_GROUPS,
            900,
            8.0,
            16,
            &[PLANNED_MAINTENANCE],
        ),
        MaintenanceJobs => (
            "Maintenance Jobs",
            MAINTENANCE_JOB_GROUPS,
            3600,
            5.0,
            8,
            &[PLANNED_MAINTENANCE, "managed_by_third_party"],
        ),
        TempdbConfig => (
            "TempDB Configuration",
            TEMPDB_GROUPS,
            86400,
            3.0,
            8,
            &[PLANNED_MAINTENANCE],
        ),
        Autogrowth => (
            "Autogrowth",
            AUTOGROWTH_GROUPS,
            3600,
            4.0,
            8,
            &[PLANNED_MAINTENANCE],
        ),
        WaitStats => (
            "Wait Statistics",
            WAIT_STAT_GROUPS,
            900,
            6.0,
            16,
            &[PLANNED_MAINTENANCE],
        ),
    };

    CollectorDefinition {
        kind,
        display_name,
        groups,
        default_interval_secs: interval,
        default_weight: weight,
        default_parallel_degree: degree,
        exception_kinds,
    }
}

/// Definitions of every collector in declared order.
pub fn all_definitions() -> Vec<CollectorDefinition> {
    CollectorKind::ALL.into_iter().map(definition).collect()
}

/// Shipped default threshold rules for a collector.
pub fn default_rules(kind: CollectorKind) -> Vec<ThresholdRule> {
    use CollectorKind::*;
    use ComparisonOp::*;
    use RuleAction::*;

    let table: &[(&str, ComparisonOp, f64, RuleAction, f64, &str)] = match kind {
        Cpu => &[
            ("Utilization", GreaterThan, 90.0, Penalty, 30.0, "Sustained CPU above 90%"),
            ("Utilization", GreaterThan, 98.0, Cap, 40.0, "CPU saturated"),
            ("SignalWait", GreaterThan, 25.0, Penalty, 10.0, "Scheduler pressure"),
        ],
        Memory => &[
            ("PageLifeExpectancy", LessThan, 300.0, Penalty, 25.0, "Buffer pool churn"),
            ("PageLifeExpectancy", LessThan, 100.0, Cap, 40.0, "Severe memory pressure"),
            ("MemoryGrantsPending", GreaterThan, 0.0, Penalty, 15.0, "Queries waiting for memory"),
        ],
        Io => &[
            ("ReadLatencyMs", GreaterThan, 20.0, Penalty, 15.0, "Slow reads"),
            ("ReadLatencyMs", GreaterThan, 50.0, Cap, 50.0, "Very slow reads"),
            ("WriteLatencyMs", GreaterThan, 20.0, Penalty, 15.0, "Slow writes"),
            ("WriteLatencyMs", GreaterThan, 50.0, Cap, 50.0, "Very slow writes"),
        ],
        Disks => &[
            ("FreeSpacePercent", LessThan, 5.0, ScoreOverride, 10.0, "Volume nearly full"),
            ("FreeSpacePercent", LessThan, 10.0, Cap, 40.0, "Low free space"),
            ("FreeSpacePercent", LessThan, 20.0, Penalty, 20.0, "Free space below 20%"),
        ],
        Backups => &[
            ("HoursSinceFullBackup", GreaterThan, 168.0, Penalty, 40.0, "No full backup in 7 days"),
            ("HoursSinceFullBackup", GreaterThan, 336.0, Cap, 30.0, "No full backup in 14 days"),
            ("HoursSinceLogBackup", GreaterThan, 24.0, Penalty, 20.0, "Log backups behind"),
        ],
        AlwaysOn => &[
            ("UnhealthyReplicas", GreaterThan, 0.0, Penalty, 40.0, "Replica not healthy"),
            ("SendQueueMb", GreaterThan, 1024.0, Penalty, 20.0, "Send queue above 1 GB"),
        ],
        LogChain => &[
            ("BrokenChains", GreaterThan, 0.0, ScoreOverride, 20.0, "Log chain broken"),
        ],
        DatabaseStates => &[
            ("SuspectDatabases", GreaterThan, 0.0, ScoreOverride, 0.0, "Suspect database"),
            ("OfflineDatabases", GreaterThan, 0.0, Cap, 30.0, "Offline database"),
        ],
        CriticalErrors => &[
            ("SevereErrorsLast24h", GreaterThan, 0.0, Penalty, 25.0, "Severity 17+ errors logged"),
            ("SevereErrorsLast24h", GreaterThan, 10.0, Cap, 30.0, "Repeated severe errors"),
        ],
        MaintenanceJobs => &[
            ("FailedJobs", GreaterThan, 0.0, Penalty, 20.0, "Failed maintenance jobs"),
            ("DaysSinceIntegrityCheck", GreaterThan, 7.0, Penalty, 30.0, "Integrity check overdue"),
        ],
        TempdbConfig => &[
            ("DataFileCountDeviation", GreaterThan, 0.0, Penalty, 20.0, "Data file count off"),
            ("UnevenFileSizes", Equal, 1.0, Penalty, 15.0, "Data files unevenly sized"),
        ],
        Autogrowth => &[
            ("PercentGrowthFiles", GreaterThan, 0.0, Penalty, 15.0, "Percent-based growth"),
            ("EventsLast24h", GreaterThan, 50.0, Penalty, 20.0, "Frequent growth events"),
        ],
        WaitStats => &[
            ("SignalWaitPercent", GreaterThan, 25.0, Penalty, 20.0, "High signal waits"),
            ("PageIoLatchMs", GreaterThan, 15.0, Penalty, 15.0, "Page latch waits"),
        ],
    };

    let mut positions: Vec<(&str, u32)> = Vec::new();
    table
        .iter()
        .map(|(group, op, threshold, action, value, description)| {
            let position = match positions.iter_mut().find(|(g, _)| g == group) {
                Some((_, p)) => {
                    *p += 1;
                    *p
                }
                None => {
                    positions.push((*group, 1));
                    1
                }
            };
            ThresholdRule::new(kind, *group, position, *op, *threshold, *action, *value)
                .with_description(*description)
        })
        .collect()
}

/// Validate an exception label against the collector's supported labels.
pub fn check_exception_kind(kind: CollectorKind, label: Option<&str>) -> ScoringResult<()> {
    match label {
        Some(label) if !definition(kind).supports_exception_kind(label) => {
            Err(ScoringError::UnsupportedExceptionKind {
                kind,
                label: label.to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_total_100() {
        let total: f64 = all_definitions().iter().map(|d| d.default_weight).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_defaults_respect_limits() {
        for def in all_definitions() {
            assert!(def.default_interval_secs >= dbpulse_types::MIN_INTERVAL_SECS);
            assert!(def.default_parallel_degree >= 1);
            assert!(def.default_parallel_degree <= dbpulse_types::MAX_PARALLEL_DEGREE);
        }
    }

    #[test]
    fn test_default_rules_read_declared_groups() {
        for def in all_definitions() {
            let rules = default_rules(def.kind);
            assert!(!rules.is_empty(), "{} has no rules", def.kind);
            for rule in rules {
                assert_eq!(rule.kind, def.kind);
                assert!(def.groups.iter().any(|g| g.name == rule.group));
            }
        }
    }

    #[test]
    fn test_positions_increase_within_group() {
        let rules = default_rules(CollectorKind::Cpu);
        assert_eq!(rules[0].position, 1);
        assert_eq!(rules[1].position, 2);
        assert_eq!(rules[2].group, "SignalWait");
        assert_eq!(rules[2].position, 1);
    }

    #[test]
    fn test_exception_kind_check() {
        assert!(
            check_exception_kind(CollectorKind::Backups, Some("no_full_backup_required")).is_ok()
        );
        assert!(check_exception_kind(CollectorKind::Cpu, None).is_ok());
        assert!(check_exception_kind(CollectorKind::Cpu, Some("no_full_backup_required")).is_err());
    }
}
