//! Fleet and transition summaries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dbpulse_types::{CollectorKind, FinalHealthScore, HealthStatus, ServerName, TransitionEvent};
use serde::{Deserialize, Serialize};

/// Number of instances listed in [`FleetHealthSummary::worst`].
pub const WORST_INSTANCES: usize = 5;

/// Summary of health across the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetHealthSummary {
    /// Total number of scored instances.
    pub total_instances: usize,

    pub healthy_count: usize,
    pub warning_count: usize,
    pub risk_count: usize,
    pub critical_count: usize,

    /// Instances whose score used at least one stale category.
    pub stale_count: usize,

    /// Average final score across the fleet.
    pub average_score: f64,

    /// Minimum final score in the fleet.
    pub min_score: f64,

    /// Maximum final score in the fleet.
    pub max_score: f64,

    /// Lowest-scoring instances, worst first.
    pub worst: Vec<(ServerName, f64)>,

    /// Time of this summary.
    pub summarized_at: DateTime<Utc>,
}

impl FleetHealthSummary {
    /// Create summary from the latest final score of each instance.
    pub fn from_scores(scores: &[FinalHealthScore]) -> Self {
        let total_instances = scores.len();

        if total_instances == 0 {
            return Self {
                total_instances: 0,
                healthy_count: 0,
                warning_count: 0,
                risk_count: 0,
                critical_count: 0,
                stale_count: 0,
                average_score: 0.0,
                min_score: 0.0,
                max_score: 0.0,
                worst: Vec::new(),
                summarized_at: Utc::now(),
            };
        }

        let mut healthy_count = 0;
        let mut warning_count = 0;
        let mut risk_count = 0;
        let mut critical_count = 0;
        let mut stale_count = 0;
        let mut total_score = 0.0;
        let mut min_score = f64::MAX;
        let mut max_score = f64::MIN;

        for score in scores {
            match score.status {
                HealthStatus::Healthy => healthy_count += 1,
                HealthStatus::Warning => warning_count += 1,
                HealthStatus::Risk => risk_count += 1,
                HealthStatus::Critical => critical_count += 1,
            }

            if score.has_stale_inputs() {
                stale_count += 1;
            }

            total_score += score.final_score;
            min_score = min_score.min(score.final_score);
            max_score = max_score.max(score.final_score);
        }

        let mut ranked: Vec<(ServerName, f64)> = scores
            .iter()
            .map(|s| (s.server.clone(), s.final_score))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(WORST_INSTANCES);

        Self {
            total_instances,
            healthy_count,
            warning_count,
            risk_count,
            critical_count,
            stale_count,
            average_score: total_score / total_instances as f64,
            min_score,
            max_score,
            worst: ranked,
            summarized_at: Utc::now(),
        }
    }

    /// Calculate the percentage of healthy instances.
    pub fn healthy_percentage(&self) -> f64 {
        if self.total_instances == 0 {
            return 0.0;
        }
        (self.healthy_count as f64 / self.total_instances as f64) * 100.0
    }
}

/// Transition counts over a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSummary {
    /// Start of the window, if bounded.
    pub since: Option<DateTime<Utc>>,

    pub total: usize,
    pub degradations: usize,
    pub recoveries: usize,

    /// Transitions per cause category.
    pub by_cause: BTreeMap<CollectorKind, usize>,
}

impl TransitionSummary {
    /// Summarise events detected at or after `since`.
    pub fn from_events(events: &[TransitionEvent], since: Option<DateTime<Utc>>) -> Self {
        let mut summary = Self {
            since,
            total: 0,
            degradations: 0,
            recoveries: 0,
            by_cause: BTreeMap::new(),
        };

        for event in events
            .iter()
            .filter(|e| since.map_or(true, |since| e.detected_at >= since))
        {
            summary.total += 1;
            if event.is_degradation() {
                summary.degradations += 1;
            } else {
                summary.recoveries += 1;
            }
            *summary.by_cause.entry(event.cause).or_insert(0) += 1;
        }

        summary
    }
}
