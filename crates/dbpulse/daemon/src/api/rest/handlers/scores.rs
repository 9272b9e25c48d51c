//! Score, transition and consolidation handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use dbpulse_scoring::ConsolidationReport;
use dbpulse_types::{CategoryScore, FinalHealthScore, ServerName, TransitionEvent};
use serde::Deserialize;

/// Latest final score of every instance
pub async fn list_scores(State(state): State<AppState>) -> ApiResult<Json<Vec<FinalHealthScore>>> {
    let mut scores = state.storage.latest_final_scores().await?;
    scores.sort_by(|a, b| a.server.cmp(&b.server));
    Ok(Json(scores))
}

/// Latest final score of one instance
pub async fn get_score(
    State(state): State<AppState>,
    Path(server): Path<String>,
) -> ApiResult<Json<FinalHealthScore>> {
    let server = ServerName::new(server);
    let score = state
        .storage
        .latest_final_score(&server)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No health score for {}", server)))?;
    Ok(Json(score))
}

/// Latest category score per collector for one instance
pub async fn get_category_scores(
    State(state): State<AppState>,
    Path(server): Path<String>,
) -> ApiResult<Json<Vec<CategoryScore>>> {
    let server = ServerName::new(server);
    let scores = state.storage.latest_category_scores(&server).await?;
    if scores.is_empty() {
        return Err(ApiError::NotFound(format!("No category scores for {}", server)));
    }
    Ok(Json(scores))
}

/// Transition query
#[derive(Debug, Deserialize)]
pub struct TransitionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Only transitions of this server
    #[serde(default)]
    pub server: Option<String>,
}

fn default_limit() -> usize {
    100
}

/// Recent transitions, newest first
pub async fn list_transitions(
    State(state): State<AppState>,
    Query(query): Query<TransitionsQuery>,
) -> ApiResult<Json<Vec<TransitionEvent>>> {
    let limit = query.limit.min(1000);
    let events = match query.server {
        Some(server) => {
            state
                .storage
                .list_transitions_for_server(&ServerName::new(server), limit)
                .await?
        }
        None => state.storage.list_transitions(limit).await?,
    };
    Ok(Json(events))
}

/// Run a consolidation cycle now
pub async fn run_consolidation(
    State(state): State<AppState>,
) -> ApiResult<Json<ConsolidationReport>> {
    let report = state.admin.run_consolidation().await?;

    tracing::info!(
        scored = report.instances_scored,
        transitions = report.transitions.len(),
        "Manual consolidation completed"
    );

    Ok(Json(report))
}
