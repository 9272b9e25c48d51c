//! Score types
//!
//! Category scores are written by collectors, final scores and transitions by
//! the consolidator. All three are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collector::CollectorKind;
use crate::ids::{RunId, ServerName, TransitionId};
use crate::rules::{Measurement, ThresholdRule};

/// Status bucket of a final health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Risk,
    Critical,
}

impl HealthStatus {
    /// Severity rank, higher is worse.
    pub fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Warning => 1,
            HealthStatus::Risk => 2,
            HealthStatus::Critical => 3,
        }
    }

    pub fn is_worse_than(&self, other: HealthStatus) -> bool {
        self.severity() > other.severity()
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Risk => write!(f, "risk"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Score of one category on one instance, produced by one collector run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub server: ServerName,
    pub kind: CollectorKind,
    pub run_id: RunId,

    /// Score in [0, 100]
    pub score: f64,

    /// Raw measurement the score was derived from
    pub measurement: Measurement,

    /// Rule that determined the score, if any
    #[serde(default)]
    pub fired_rule: Option<ThresholdRule>,

    /// Whether an active exception forced the score to 100
    #[serde(default)]
    pub suppressed_by_exception: bool,

    #[serde(default)]
    pub notes: Vec<String>,

    pub scored_at: DateTime<Utc>,
}

/// Contribution of one category to a final score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryContribution {
    pub kind: CollectorKind,
    pub score: f64,
    pub weight: f64,

    /// `score * weight / total present weight`
    pub contribution: f64,

    pub scored_at: DateTime<Utc>,

    /// Category row trails its collector's last run by more than the
    /// staleness window
    #[serde(default)]
    pub stale: bool,
}

/// Consolidated health score of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalHealthScore {
    pub server: ServerName,

    /// Weighted score before consolidation caps
    pub raw_score: f64,

    /// Consolidation cap that lowered the score, if any
    #[serde(default)]
    pub cap_applied: Option<ThresholdRule>,

    /// Score after caps, in [0, 100]
    pub final_score: f64,

    pub status: HealthStatus,

    pub breakdown: Vec<CategoryContribution>,

    pub computed_at: DateTime<Utc>,
}

impl FinalHealthScore {
    /// Contribution for a given category, if present.
    pub fn contribution(&self, kind: CollectorKind) -> Option<&CategoryContribution> {
        self.breakdown.iter().find(|c| c.kind == kind)
    }

    /// Whether any category in the breakdown is stale.
    pub fn has_stale_inputs(&self) -> bool {
        self.breakdown.iter().any(|c| c.stale)
    }
}

/// Status bucket change of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub id: TransitionId,
    pub server: ServerName,
    pub previous_status: HealthStatus,
    pub new_status: HealthStatus,
    pub previous_score: f64,
    pub new_score: f64,

    /// Category with the lowest weighted contribution
    pub cause: CollectorKind,

    pub detected_at: DateTime<Utc>,
}

impl TransitionEvent {
    /// Whether the instance moved to a worse bucket.
    pub fn is_degradation(&self) -> bool {
        self.new_status.is_worse_than(self.previous_status)
    }
}
