//! Scoring configuration and validation.
//!
//! Status boundaries, consolidation caps and the checks applied at the
//! configuration boundary before anything reaches the scheduler.

use dbpulse_types::{
    CollectorConfig, CollectorKind, ComparisonOp, HealthStatus, RuleAction, ThresholdRule,
    MAX_PARALLEL_DEGREE, MIN_INTERVAL_SECS,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ScoringError, ScoringResult};
use crate::evaluator::MAX_SCORE;

/// Lower bounds of the status buckets.
///
/// A score at or above `healthy` is Healthy, at or above `warning` is
/// Warning, at or above `risk` is Risk, and anything lower is Critical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusBoundaries {
    pub healthy: f64,
    pub warning: f64,
    pub risk: f64,
}

impl Default for StatusBoundaries {
    fn default() -> Self {
        Self {
            healthy: 85.0,
            warning: 60.0,
            risk: 40.0,
        }
    }
}

impl StatusBoundaries {
    /// Bucket a final score.
    pub fn classify(&self, score: f64) -> HealthStatus {
        if score >= self.healthy {
            HealthStatus::Healthy
        } else if score >= self.warning {
            HealthStatus::Warning
        } else if score >= self.risk {
            HealthStatus::Risk
        } else {
            HealthStatus::Critical
        }
    }

    /// Boundaries must lie in [0, 100] and be strictly descending.
    pub fn validate(&self) -> ScoringResult<()> {
        for (name, value) in [
            ("healthy", self.healthy),
            ("warning", self.warning),
            ("risk", self.risk),
        ] {
            if !value.is_finite() || !(0.0..=MAX_SCORE).contains(&value) {
                return Err(ScoringError::InvalidBoundaries(format!(
                    "{name} boundary {value} is outside 0-100"
                )));
            }
        }
        if !(self.healthy > self.warning && self.warning > self.risk) {
            return Err(ScoringError::InvalidBoundaries(format!(
                "boundaries must be strictly descending, got healthy={} warning={} risk={}",
                self.healthy, self.warning, self.risk
            )));
        }
        Ok(())
    }
}

/// Configuration of the consolidation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Status bucket boundaries.
    #[serde(default)]
    pub boundaries: StatusBoundaries,

    /// Cap rules applied to the weighted score. Each rule's group names a
    /// category and reads that category's score.
    #[serde(default = "default_consolidation_caps")]
    pub caps: Vec<ThresholdRule>,

    /// A category row older than this many collector intervals, measured
    /// from the collector's last run, is flagged stale in the breakdown.
    #[serde(default = "default_stale_after_intervals")]
    pub stale_after_intervals: u32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            boundaries: StatusBoundaries::default(),
            caps: default_consolidation_caps(),
            stale_after_intervals: default_stale_after_intervals(),
        }
    }
}

impl ConsolidationConfig {
    pub fn validate(&self) -> ScoringResult<()> {
        self.boundaries.validate()?;
        validate_consolidation_caps(&self.caps)
    }
}

fn default_stale_after_intervals() -> u32 {
    3
}

/// Shipped consolidation caps.
pub fn default_consolidation_caps() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule::new(
            CollectorKind::DatabaseStates,
            CollectorKind::DatabaseStates.as_str(),
            1,
            ComparisonOp::LessOrEqual,
            30.0,
            RuleAction::Cap,
            39.0,
        )
        .with_description("Offline or suspect databases keep the instance Critical"),
        ThresholdRule::new(
            CollectorKind::Backups,
            CollectorKind::Backups.as_str(),
            1,
            ComparisonOp::LessOrEqual,
            30.0,
            RuleAction::Cap,
            59.0,
        )
        .with_description("Badly overdue backups keep the instance at Risk"),
    ]
}

/// Reject collector configurations that must never reach the scheduler.
pub fn validate_collector_config(config: &CollectorConfig) -> ScoringResult<()> {
    let invalid = |reason: String| ScoringError::InvalidConfig {
        kind: config.kind,
        reason,
    };

    if config.interval_secs < MIN_INTERVAL_SECS {
        return Err(invalid(format!(
            "interval {}s is below the minimum of {}s",
            config.interval_secs, MIN_INTERVAL_SECS
        )));
    }
    if !config.weight.is_finite() || !(0.0..=MAX_SCORE).contains(&config.weight) {
        return Err(invalid(format!("weight {} is outside 0-100", config.weight)));
    }
    if config.parallel_degree == 0 || config.parallel_degree > MAX_PARALLEL_DEGREE {
        return Err(invalid(format!(
            "parallel degree {} is outside 1-{}",
            config.parallel_degree, MAX_PARALLEL_DEGREE
        )));
    }
    if !config.baseline_score.is_finite() || !(0.0..=MAX_SCORE).contains(&config.baseline_score) {
        return Err(invalid(format!(
            "baseline score {} is outside 0-100",
            config.baseline_score
        )));
    }
    Ok(())
}

/// Reject malformed rules for a collector.
pub fn validate_rules(kind: CollectorKind, rules: &[ThresholdRule]) -> ScoringResult<()> {
    for rule in rules {
        let invalid = |reason: String| ScoringError::InvalidRule {
            kind,
            group: rule.group.clone(),
            reason,
        };

        if rule.kind != kind {
            return Err(invalid(format!("rule belongs to {}", rule.kind)));
        }
        if rule.group.trim().is_empty() {
            return Err(invalid("group name is empty".to_string()));
        }
        if !rule.threshold.is_finite() {
            return Err(invalid(format!("threshold {} is not finite", rule.threshold)));
        }
        if !rule.value.is_finite() || !(0.0..=MAX_SCORE).contains(&rule.value) {
            return Err(invalid(format!("value {} is outside 0-100", rule.value)));
        }
    }
    Ok(())
}

/// Consolidation rules must be caps keyed by a category name.
pub fn validate_consolidation_caps(rules: &[ThresholdRule]) -> ScoringResult<()> {
    for rule in rules {
        let invalid = |reason: String| ScoringError::InvalidRule {
            kind: rule.kind,
            group: rule.group.clone(),
            reason,
        };

        if rule.action != RuleAction::Cap {
            return Err(invalid(format!(
                "consolidation rules must be caps, got {}",
                rule.action
            )));
        }
        match rule.group.parse::<CollectorKind>() {
            Ok(kind) if kind == rule.kind => {}
            _ => {
                return Err(invalid(format!(
                    "group must name the rule's category ({})",
                    rule.kind
                )))
            }
        }
        validate_rules(rule.kind, std::slice::from_ref(rule))?;
    }
    Ok(())
}

/// Weight-total deviation from 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightReport {
    /// Sum of enabled collector weights.
    pub total_weight: f64,

    /// Number of enabled collectors.
    pub enabled_collectors: usize,

    /// Warning text when the total is not 100.
    pub warning: Option<String>,
}

/// Check whether enabled weights add up to 100.
///
/// A deviation is never an error: consolidation divides by the weight of the
/// categories actually present.
pub fn check_weights(configs: &[CollectorConfig]) -> WeightReport {
    let enabled: Vec<&CollectorConfig> = configs.iter().filter(|c| c.enabled).collect();
    let total_weight: f64 = enabled.iter().map(|c| c.weight).sum();

    let warning = if (total_weight - 100.0).abs() > 1e-6 {
        warn!(
            total_weight,
            enabled = enabled.len(),
            "Enabled collector weights do not sum to 100"
        );
        Some(format!(
            "enabled collector weights sum to {total_weight}, not 100"
        ))
    } else {
        None
    };

    WeightReport {
        total_weight,
        enabled_collectors: enabled.len(),
        warning,
    }
}
