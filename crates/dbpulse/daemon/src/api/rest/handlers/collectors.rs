//! Collector configuration and run handlers

use super::parse_kind;
use crate::admin::CollectorUpdate;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use dbpulse_scoring::{catalog, WeightReport};
use dbpulse_types::{CollectorConfig, CollectorConfigUpdate, CollectorExecutionLog, RunId};
use serde::{Deserialize, Serialize};

/// Collector configuration with live state
#[derive(Debug, Serialize)]
pub struct CollectorView {
    #[serde(flatten)]
    pub config: CollectorConfig,
    pub display_name: &'static str,
    pub running: bool,
}

/// List all collector configurations
pub async fn list_collectors(State(state): State<AppState>) -> ApiResult<Json<Vec<CollectorView>>> {
    let configs = state.admin.list_collectors().await?;

    let views = configs
        .into_iter()
        .map(|config| CollectorView {
            display_name: catalog::definition(config.kind).display_name,
            running: state.admin.is_running(config.kind),
            config,
        })
        .collect();

    Ok(Json(views))
}

/// Update one collector
pub async fn update_collector(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(update): Json<CollectorConfigUpdate>,
) -> ApiResult<Json<CollectorUpdate>> {
    let kind = parse_kind(&kind)?;
    let result = state.admin.update_collector(kind, update).await?;
    Ok(Json(result))
}

/// Weight-total check across enabled collectors
pub async fn collector_weights(State(state): State<AppState>) -> ApiResult<Json<WeightReport>> {
    Ok(Json(state.admin.weight_report().await?))
}

/// Trigger response
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub run_id: RunId,
    pub kind: String,
}

/// Run a collector now
pub async fn run_collector(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let kind = parse_kind(&kind)?;
    let run_id = state.admin.trigger(kind).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            run_id,
            kind: kind.to_string(),
        }),
    ))
}

/// Execution log query
#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Recent execution logs of a collector, newest first
pub async fn list_executions(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ExecutionsQuery>,
) -> ApiResult<Json<Vec<CollectorExecutionLog>>> {
    let kind = parse_kind(&kind)?;
    let logs = state.admin.executions(kind, query.limit.min(500)).await?;
    Ok(Json(logs))
}
