//! Threshold evaluation.
//!
//! Turns a measurement into a bounded category score. Rules are grouped by
//! metric group in order of first appearance and sorted by position inside
//! each group. The first matching score override wins outright; otherwise
//! penalties accumulate against the baseline (floored at zero) and caps bound
//! the result from above.

use dbpulse_types::{Measurement, RuleAction, ThresholdRule};
use serde::{Deserialize, Serialize};

/// Upper bound of every score.
pub const MAX_SCORE: f64 = 100.0;

/// Outcome of evaluating one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Score in [0, 100].
    pub score: f64,

    /// Rule that determined the score, if any.
    pub fired: Option<ThresholdRule>,

    /// Every rule that matched, in evaluation order.
    pub matched: Vec<ThresholdRule>,
}

impl Evaluation {
    fn unmatched(baseline: f64) -> Self {
        Self {
            score: clamp_score(baseline),
            fired: None,
            matched: Vec::new(),
        }
    }
}

/// Clamp a score into [0, 100]; NaN maps to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_SCORE)
}

/// Order rules by group (first appearance) then by position.
pub fn ordered_rules(rules: &[ThresholdRule]) -> Vec<&ThresholdRule> {
    let mut groups: Vec<&str> = Vec::new();
    for rule in rules {
        if !groups.contains(&rule.group.as_str()) {
            groups.push(rule.group.as_str());
        }
    }

    let mut ordered: Vec<&ThresholdRule> = rules.iter().collect();
    // Stable sort keeps declaration order for equal positions.
    ordered.sort_by_key(|rule| {
        let group_index = groups
            .iter()
            .position(|g| *g == rule.group)
            .unwrap_or(usize::MAX);
        (group_index, rule.position)
    });
    ordered
}

/// Evaluate a measurement against a rule set.
///
/// Pure and deterministic: the same inputs always yield the same
/// [`Evaluation`]. A group without a reading contributes nothing.
pub fn evaluate(measurement: &Measurement, rules: &[ThresholdRule], baseline: f64) -> Evaluation {
    let baseline = clamp_score(baseline);
    let mut matched: Vec<ThresholdRule> = Vec::new();
    let mut penalty_total = 0.0;
    let mut largest_penalty: Option<&ThresholdRule> = None;
    let mut binding_cap: Option<&ThresholdRule> = None;

    for rule in ordered_rules(rules) {
        let Some(reading) = measurement.reading(&rule.group) else {
            continue;
        };
        if !rule.matches(reading) {
            continue;
        }
        matched.push(rule.clone());

        match rule.action {
            RuleAction::ScoreOverride => {
                return Evaluation {
                    score: clamp_score(rule.value),
                    fired: Some(rule.clone()),
                    matched,
                };
            }
            RuleAction::Penalty => {
                penalty_total += rule.value;
                if largest_penalty.map_or(true, |current| rule.value > current.value) {
                    largest_penalty = Some(rule);
                }
            }
            RuleAction::Cap => {
                if binding_cap.map_or(true, |current| rule.value < current.value) {
                    binding_cap = Some(rule);
                }
            }
        }
    }

    if matched.is_empty() {
        return Evaluation::unmatched(baseline);
    }

    let penalized = (baseline - penalty_total).max(0.0);
    let (score, fired) = match binding_cap {
        Some(cap) if cap.value < penalized => (cap.value, Some(cap)),
        _ => (penalized, largest_penalty),
    };

    Evaluation {
        score: clamp_score(score),
        fired: fired.cloned(),
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbpulse_types::{CollectorKind, ComparisonOp};

    fn rule(
        group: &str,
        position: u32,
        op: ComparisonOp,
        threshold: f64,
        action: RuleAction,
        value: f64,
    ) -> ThresholdRule {
        ThresholdRule::new(CollectorKind::Cpu, group, position, op, threshold, action, value)
    }

    fn cpu_rules() -> Vec<ThresholdRule> {
        vec![
            rule("Utilization", 1, ComparisonOp::GreaterThan, 90.0, RuleAction::Penalty, 30.0),
            rule("Utilization", 2, ComparisonOp::GreaterThan, 98.0, RuleAction::Cap, 40.0),
        ]
    }

    #[test]
    fn test_penalty_applies() {
        let m = Measurement::new().with_reading("Utilization", 95.0);
        let eval = evaluate(&m, &cpu_rules(), 100.0);

        assert_eq!(eval.score, 70.0);
        assert_eq!(eval.fired.unwrap().action, RuleAction::Penalty);
        assert_eq!(eval.matched.len(), 1);
    }

    #[test]
    fn test_cap_bounds_penalized_score() {
        let m = Measurement::new().with_reading("Utilization", 99.0);
        let eval = evaluate(&m, &cpu_rules(), 100.0);

        assert_eq!(eval.score, 40.0);
        assert_eq!(eval.fired.unwrap().action, RuleAction::Cap);
        assert_eq!(eval.matched.len(), 2);
    }

    #[test]
    fn test_no_match_yields_baseline() {
        let m = Measurement::new().with_reading("Utilization", 20.0);
        let eval = evaluate(&m, &cpu_rules(), 100.0);
        assert_eq!(eval.score, 100.0);
        assert!(eval.fired.is_none());

        let eval = evaluate(&m, &cpu_rules(), 90.0);
        assert_eq!(eval.score, 90.0);
    }

    #[test]
    fn test_missing_group_contributes_nothing() {
        let m = Measurement::new().with_reading("SignalWait", 50.0);
        let eval = evaluate(&m, &cpu_rules(), 100.0);
        assert_eq!(eval.score, 100.0);
    }

    #[test]
    fn test_override_wins_over_earlier_penalties() {
        let rules = vec![
            rule("Latency", 1, ComparisonOp::GreaterThan, 10.0, RuleAction::Penalty, 20.0),
            rule("Errors", 1, ComparisonOp::GreaterThan, 0.0, RuleAction::ScoreOverride, 15.0),
            rule("Errors", 2, ComparisonOp::GreaterThan, 0.0, RuleAction::Cap, 5.0),
        ];
        let m = Measurement::new()
            .with_reading("Latency", 50.0)
            .with_reading("Errors", 3.0);

        let eval = evaluate(&m, &rules, 100.0);
        assert_eq!(eval.score, 15.0);
        assert_eq!(eval.fired.unwrap().action, RuleAction::ScoreOverride);
    }

    #[test]
    fn test_penalties_floor_at_zero() {
        let rules = vec![
            rule("A", 1, ComparisonOp::GreaterOrEqual, 0.0, RuleAction::Penalty, 80.0),
            rule("B", 1, ComparisonOp::GreaterOrEqual, 0.0, RuleAction::Penalty, 80.0),
        ];
        let m = Measurement::new().with_reading("A", 1.0).with_reading("B", 1.0);

        let eval = evaluate(&m, &rules, 100.0);
        assert_eq!(eval.score, 0.0);
    }

    #[test]
    fn test_position_orders_within_group() {
        // Both overrides match; the lower position wins regardless of slice order.
        let rules = vec![
            rule("Free", 2, ComparisonOp::LessThan, 10.0, RuleAction::ScoreOverride, 30.0),
            rule("Free", 1, ComparisonOp::LessThan, 5.0, RuleAction::ScoreOverride, 10.0),
        ];
        let m = Measurement::new().with_reading("Free", 3.0);

        let eval = evaluate(&m, &rules, 100.0);
        assert_eq!(eval.score, 10.0);
    }

    #[test]
    fn test_largest_penalty_is_reported() {
        let rules = vec![
            rule("A", 1, ComparisonOp::GreaterThan, 0.0, RuleAction::Penalty, 5.0),
            rule("B", 1, ComparisonOp::GreaterThan, 0.0, RuleAction::Penalty, 25.0),
        ];
        let m = Measurement::new().with_reading("A", 1.0).with_reading("B", 1.0);

        let eval = evaluate(&m, &rules, 100.0);
        assert_eq!(eval.score, 70.0);
        assert_eq!(eval.fired.unwrap().group, "B");
    }

    #[test]
    fn test_non_binding_cap_is_not_reported() {
        let rules = vec![
            rule("A", 1, ComparisonOp::GreaterThan, 0.0, RuleAction::Penalty, 60.0),
            rule("A", 2, ComparisonOp::GreaterThan, 0.0, RuleAction::Cap, 80.0),
        ];
        let m = Measurement::new().with_reading("A", 1.0);

        let eval = evaluate(&m, &rules, 100.0);
        assert_eq!(eval.score, 40.0);
        assert_eq!(eval.fired.unwrap().action, RuleAction::Penalty);
    }
}
