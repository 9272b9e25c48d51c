//! # dbpulse Scoring - Threshold evaluation and health-score consolidation
//!
//! Pure scoring logic shared by the daemon: nothing here performs I/O or
//! reads the clock on its own.
//!
//! ## Key Components
//!
//! - [`evaluate`]: Turns a measurement into a bounded category score
//! - [`catalog`]: Registration table of the 13 collectors and their default rules
//! - [`consolidate`]: Combines category scores into a final health score
//! - [`FleetHealthSummary`] / [`TransitionSummary`]: Fleet-level views
//!
//! ## Scoring Rules
//!
//! - A matching score override wins immediately
//! - Penalties accumulate against the baseline, floored at zero
//! - Caps bound the result from above
//! - Every score is clamped to [0, 100]
//!
//! ## Example
//!
//! ```rust
//! use dbpulse_scoring::{catalog, evaluate};
//! use dbpulse_types::{CollectorKind, Measurement};
//!
//! let rules = catalog::default_rules(CollectorKind::Cpu);
//! let measurement = Measurement::new().with_reading("Utilization", 95.0);
//!
//! let evaluation = evaluate(&measurement, &rules, 100.0);
//! assert_eq!(evaluation.score, 70.0);
//! ```

pub mod catalog;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod evaluator;
pub mod exceptions;
pub mod summary;

// Re-export main types
pub use catalog::{CollectorDefinition, MetricGroup};
pub use config::{
    check_weights, validate_collector_config, validate_consolidation_caps, validate_rules,
    ConsolidationConfig, StatusBoundaries, WeightReport,
};
pub use consolidation::{consolidate, ConsolidationReport, InstanceOutcome, SkipReason};
pub use error::{ScoringError, ScoringResult};
pub use evaluator::{evaluate, Evaluation};
pub use summary::{FleetHealthSummary, TransitionSummary};
