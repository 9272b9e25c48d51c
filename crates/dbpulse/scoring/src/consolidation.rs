//! Health-score consolidation.
//!
//! Combines the latest category scores of one instance into a weighted,
//! capped final score, buckets it, and detects status transitions against the
//! previous final score. Everything here is pure. The caller's clock only
//! stamps `computed_at` and `detected_at`; staleness is measured against each
//! collector's last recorded run, so an unchanged store yields an identical
//! score.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use dbpulse_types::{
    CategoryContribution, CategoryScore, CollectorConfig, CollectorKind, FinalHealthScore,
    Measurement, ServerName, TransitionEvent, TransitionId,
};
use serde::{Deserialize, Serialize};

use crate::config::ConsolidationConfig;
use crate::evaluator::{clamp_score, evaluate};

/// Why an instance produced no final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No category score for any enabled collector.
    NoScores,
    /// Present categories carry zero total weight.
    ZeroWeight,
}

/// Result of consolidating one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceOutcome {
    Scored {
        score: FinalHealthScore,
        transition: Option<TransitionEvent>,
    },
    Skipped {
        server: ServerName,
        reason: SkipReason,
    },
}

/// Summary of one consolidation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub instances_scored: usize,
    pub instances_skipped: usize,
    pub transitions: Vec<TransitionEvent>,
}

impl ConsolidationReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            instances_scored: 0,
            instances_skipped: 0,
            transitions: Vec::new(),
        }
    }

    /// Fold one instance outcome into the report.
    pub fn record(&mut self, outcome: &InstanceOutcome) {
        match outcome {
            InstanceOutcome::Scored { transition, .. } => {
                self.instances_scored += 1;
                if let Some(event) = transition {
                    self.transitions.push(event.clone());
                }
            }
            InstanceOutcome::Skipped { .. } => self.instances_skipped += 1,
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
    }
}

// Ten years; keeps the window representable.
const MAX_STALE_WINDOW_SECS: u64 = 10 * 365 * 86_400;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A row is stale when its collector has run since without refreshing it
/// for `stale_after_intervals` intervals.
fn is_stale(
    row: &CategoryScore,
    collector: &CollectorConfig,
    stale_after_intervals: u32,
) -> bool {
    let window = Duration::seconds(
        collector
            .interval_secs
            .saturating_mul(stale_after_intervals as u64)
            .min(MAX_STALE_WINDOW_SECS) as i64,
    );
    collector
        .last_run_at
        .map_or(false, |last_run| last_run - row.scored_at > window)
}

/// Consolidate one instance.
///
/// `latest` holds the most recent category score per collector kind for this
/// server; rows for disabled or unknown collectors are ignored. `previous` is
/// the instance's last final score, if any.
pub fn consolidate(
    server: &ServerName,
    latest: &[CategoryScore],
    configs: &[CollectorConfig],
    config: &ConsolidationConfig,
    previous: Option<&FinalHealthScore>,
    now: DateTime<Utc>,
) -> InstanceOutcome {
    let enabled: BTreeMap<CollectorKind, &CollectorConfig> = configs
        .iter()
        .filter(|c| c.enabled)
        .map(|c| (c.kind, c))
        .collect();

    // Latest row per enabled kind, in declared kind order.
    let mut present: BTreeMap<CollectorKind, &CategoryScore> = BTreeMap::new();
    for row in latest.iter().filter(|row| &row.server == server) {
        if !enabled.contains_key(&row.kind) {
            continue;
        }
        let newer = present
            .get(&row.kind)
            .map_or(true, |current| row.scored_at > current.scored_at);
        if newer {
            present.insert(row.kind, row);
        }
    }

    if present.is_empty() {
        return InstanceOutcome::Skipped {
            server: server.clone(),
            reason: SkipReason::NoScores,
        };
    }

    let total_weight: f64 = present.keys().map(|kind| enabled[kind].weight).sum();
    if total_weight <= 0.0 {
        return InstanceOutcome::Skipped {
            server: server.clone(),
            reason: SkipReason::ZeroWeight,
        };
    }

    let breakdown: Vec<CategoryContribution> = present
        .iter()
        .map(|(kind, row)| {
            let collector = enabled[kind];
            CategoryContribution {
                kind: *kind,
                score: row.score,
                weight: collector.weight,
                contribution: round2(row.score * collector.weight / total_weight),
                scored_at: row.scored_at,
                stale: is_stale(row, collector, config.stale_after_intervals),
            }
        })
        .collect();

    let raw_score = round2(clamp_score(
        present
            .iter()
            .map(|(kind, row)| row.score * enabled[kind].weight)
            .sum::<f64>()
            / total_weight,
    ));

    let category_readings = present
        .iter()
        .fold(Measurement::new(), |m, (kind, row)| {
            m.with_reading(kind.as_str(), row.score)
        });
    let capped = evaluate(&category_readings, &config.caps, raw_score);
    let (final_score, cap_applied) = match capped.fired {
        Some(rule) if capped.score < raw_score => (round2(capped.score), Some(rule)),
        _ => (raw_score, None),
    };

    let status = config.boundaries.classify(final_score);

    let transition = previous
        .filter(|prev| prev.status != status)
        .and_then(|prev| {
            lowest_contribution(&breakdown).map(|cause| TransitionEvent {
                id: TransitionId::generate(),
                server: server.clone(),
                previous_status: prev.status,
                new_status: status,
                previous_score: prev.final_score,
                new_score: final_score,
                cause,
                detected_at: now,
            })
        });

    InstanceOutcome::Scored {
        score: FinalHealthScore {
            server: server.clone(),
            raw_score,
            cap_applied,
            final_score,
            status,
            breakdown,
            computed_at: now,
        },
        transition,
    }
}

/// Category with the lowest weighted contribution; first in kind order on ties.
pub fn lowest_contribution(breakdown: &[CategoryContribution]) -> Option<CollectorKind> {
    breakdown
        .iter()
        .fold(None::<&CategoryContribution>, |lowest, c| match lowest {
            Some(current) if current.contribution <= c.contribution => Some(current),
            _ => Some(c),
        })
        .map(|c| c.kind)
}
