//! Threshold rule handlers

use super::parse_kind;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use dbpulse_types::ThresholdRule;

/// Current rules of a collector
pub async fn get_rules(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<ThresholdRule>>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.admin.get_rules(kind).await?))
}

/// Replace the rule set of a collector
pub async fn replace_rules(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(rules): Json<Vec<ThresholdRule>>,
) -> ApiResult<Json<Vec<ThresholdRule>>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.admin.replace_rules(kind, rules).await?))
}

/// Restore the shipped rules of a collector
pub async fn reset_rules(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<ThresholdRule>>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.admin.reset_rules(kind).await?))
}
