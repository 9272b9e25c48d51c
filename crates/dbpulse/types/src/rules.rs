//! Threshold rules and raw measurements.
//!
//! A collector turns a [`Measurement`] into a category score by running it
//! through an ordered set of [`ThresholdRule`]s. Each rule belongs to a named
//! metric group and reads the measurement's reading for that group.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::collector::CollectorKind;

/// Comparison applied between a reading and a rule threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
}

impl ComparisonOp {
    /// Check whether `reading <op> threshold` holds.
    pub fn matches(&self, reading: f64, threshold: f64) -> bool {
        match self {
            ComparisonOp::GreaterThan => reading > threshold,
            ComparisonOp::GreaterOrEqual => reading >= threshold,
            ComparisonOp::LessThan => reading < threshold,
            ComparisonOp::LessOrEqual => reading <= threshold,
            ComparisonOp::Equal => (reading - threshold).abs() < f64::EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterOrEqual => ">=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::Equal => "==",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// What a matching rule does to the category score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Subtract the rule value from the running total.
    Penalty,
    /// Bound the score from above by the rule value.
    Cap,
    /// Replace the score with the rule value and stop evaluating.
    ScoreOverride,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Penalty => write!(f, "penalty"),
            RuleAction::Cap => write!(f, "cap"),
            RuleAction::ScoreOverride => write!(f, "score_override"),
        }
    }
}

/// One condition-to-action mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Collector this rule belongs to.
    pub kind: CollectorKind,

    /// Metric group the rule reads (e.g. `Latency`).
    pub group: String,

    /// Declared order within the group.
    pub position: u32,

    /// Comparison operator.
    pub operator: ComparisonOp,

    /// Threshold compared against the group reading.
    pub threshold: f64,

    /// Action taken on match.
    pub action: RuleAction,

    /// Penalty amount, cap ceiling, or override score.
    pub value: f64,

    /// Optional operator-facing description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ThresholdRule {
    pub fn new(
        kind: CollectorKind,
        group: impl Into<String>,
        position: u32,
        operator: ComparisonOp,
        threshold: f64,
        action: RuleAction,
        value: f64,
    ) -> Self {
        Self {
            kind,
            group: group.into(),
            position,
            operator,
            threshold,
            action,
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check whether the rule fires for a reading.
    pub fn matches(&self, reading: f64) -> bool {
        self.operator.matches(reading, self.threshold)
    }

    /// Short human-readable label, used in score notes.
    pub fn label(&self) -> String {
        format!(
            "{} {} {} -> {} {}",
            self.group, self.operator, self.threshold, self.action, self.value
        )
    }
}

/// Raw measurement returned by a collector for one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Reading per metric group.
    pub readings: BTreeMap<String, f64>,

    /// Diagnostic notes from the sampling layer.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Measurement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reading for a metric group.
    pub fn with_reading(mut self, group: impl Into<String>, value: f64) -> Self {
        self.readings.insert(group.into(), value);
        self
    }

    /// Add a diagnostic note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn reading(&self, group: &str) -> Option<f64> {
        self.readings.get(group).copied()
    }
}
