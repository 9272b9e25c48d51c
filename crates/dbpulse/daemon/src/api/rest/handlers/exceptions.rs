//! Collector exception handlers

use super::parse_kind;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use dbpulse_types::{CollectorException, ExceptionId, NewException};
use serde::Serialize;
use uuid::Uuid;

/// Exceptions of a collector, expired ones included
pub async fn list_exceptions(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<CollectorException>>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.admin.list_exceptions(kind).await?))
}

/// Create an exception for a collector
pub async fn create_exception(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<NewException>,
) -> ApiResult<(StatusCode, Json<CollectorException>)> {
    let kind = parse_kind(&kind)?;
    let exception = state.admin.add_exception(kind, request).await?;
    Ok((StatusCode::CREATED, Json(exception)))
}

/// Remove an exception
pub async fn delete_exception(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = Uuid::parse_str(&id)
        .map(ExceptionId::from_uuid)
        .map_err(|_| ApiError::BadRequest(format!("Invalid exception id: {}", id)))?;

    state.admin.remove_exception(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Supported exception labels
#[derive(Debug, Serialize)]
pub struct ExceptionKindsResponse {
    pub kind: String,
    pub exception_kinds: Vec<&'static str>,
}

/// Exception labels a collector accepts
pub async fn list_exception_kinds(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<ExceptionKindsResponse>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(ExceptionKindsResponse {
        kind: kind.to_string(),
        exception_kinds: state.admin.exception_kinds(kind),
    }))
}
