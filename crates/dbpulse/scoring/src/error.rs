//! Error types for dbpulse-scoring crate.
//!
//! Every variant is a configuration problem caught before it reaches the
//! orchestrator or the consolidator.

use dbpulse_types::CollectorKind;
use thiserror::Error;

/// Errors raised while validating scoring configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    /// A collector configuration field is out of range.
    #[error("invalid configuration for {kind}: {reason}")]
    InvalidConfig { kind: CollectorKind, reason: String },

    /// A threshold rule is malformed.
    #[error("invalid rule for {kind} in group {group}: {reason}")]
    InvalidRule {
        kind: CollectorKind,
        group: String,
        reason: String,
    },

    /// Status bucket boundaries are not usable.
    #[error("invalid status boundaries: {0}")]
    InvalidBoundaries(String),

    /// Exception label not supported by the collector.
    #[error("exception kind '{label}' is not supported by {kind}")]
    UnsupportedExceptionKind { kind: CollectorKind, label: String },
}

/// Result type for scoring operations.
pub type ScoringResult<T> = Result<T, ScoringError>;
