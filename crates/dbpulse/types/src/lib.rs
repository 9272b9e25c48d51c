//! dbpulse Types - Core types for collector orchestration and health scoring
//!
//! dbpulse samples operational metrics across a fleet of database server
//! instances, scores each metric category against threshold rules, and
//! consolidates the category scores into one weighted health score per
//! instance.
//!
//! ## Key Concepts
//!
//! - **CollectorKind**: One of the 13 metric categories
//! - **ThresholdRule**: Condition-to-action mapping applied to a measurement
//! - **CollectorException**: Suppresses penalties for one (collector, server) pair
//! - **CategoryScore**: Bounded score of one category on one instance
//! - **FinalHealthScore**: Weighted, capped score with a status bucket
//! - **TransitionEvent**: Change of status bucket between consolidation cycles

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod collector;
pub mod exception;
pub mod ids;
pub mod instance;
pub mod rules;
pub mod score;

// Re-export main types
pub use collector::{
    CollectorConfig, CollectorConfigUpdate, CollectorExecutionLog, CollectorKind, ParseKindError,
    RunStatus, TriggerKind, MAX_PARALLEL_DEGREE, MIN_INTERVAL_SECS,
};
pub use exception::{CollectorException, NewException};
pub use ids::{ExceptionId, RunId, ServerName, TransitionId};
pub use instance::MonitoredInstance;
pub use rules::{ComparisonOp, Measurement, RuleAction, ThresholdRule};
pub use score::{
    CategoryContribution, CategoryScore, FinalHealthScore, HealthStatus, TransitionEvent,
};
