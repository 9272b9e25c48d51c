//! API request handlers

mod collectors;
mod exceptions;
mod health;
mod rules;
mod scores;

pub use collectors::*;
pub use exceptions::*;
pub use health::*;
pub use rules::*;
pub use scores::*;

use crate::error::{ApiError, ApiResult};
use dbpulse_types::CollectorKind;

/// Resolve a collector kind path segment.
fn parse_kind(raw: &str) -> ApiResult<CollectorKind> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown collector: {}", raw)))
}
