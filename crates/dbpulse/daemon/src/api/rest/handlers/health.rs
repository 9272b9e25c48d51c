//! Liveness and fleet summary handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Query, State},
    Json,
};
use dbpulse_scoring::{FleetHealthSummary, TransitionSummary};
use dbpulse_types::CollectorKind;
use serde::{Deserialize, Serialize};

// Upper bound on transitions read for one summary window.
const SUMMARY_TRANSITION_SCAN: usize = 10_000;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub running_collectors: Vec<CollectorKind>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        running_collectors: state.admin.running_kinds(),
    })
}

/// Summary query
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Transition window in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
}

fn default_window_hours() -> i64 {
    24
}

/// Fleet summary response
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub fleet: FleetHealthSummary,
    pub healthy_percentage: f64,
    pub transitions: TransitionSummary,
}

/// Fleet health and recent transitions
pub async fn fleet_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let scores = state.storage.latest_final_scores().await?;
    let events = state
        .storage
        .list_transitions(SUMMARY_TRANSITION_SCAN)
        .await?;

    let window = chrono::Duration::hours(query.window_hours.clamp(1, 24 * 90));
    let fleet = FleetHealthSummary::from_scores(&scores);
    Ok(Json(SummaryResponse {
        healthy_percentage: fleet.healthy_percentage(),
        fleet,
        transitions: TransitionSummary::from_events(&events, Some(chrono::Utc::now() - window)),
    }))
}
