//! Error types for dbpulse-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dbpulse_scoring::ScoringError;
use dbpulse_types::{CollectorKind, ServerName};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

/// Errors raised while running one collector
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Inventory could not be fetched
    #[error("Inventory unavailable: {0}")]
    Inventory(String),

    /// One instance could not be measured
    #[error("Measurement failed for {server}: {reason}")]
    Measurement { server: ServerName, reason: String },

    /// One instance measurement exceeded its time budget
    #[error("Measurement timed out for {server} after {timeout_ms}ms")]
    Timeout { server: ServerName, timeout_ms: u64 },

    /// No metric source is registered for the collector
    #[error("No metric source registered for {0}")]
    NoSource(CollectorKind),

    /// Collector configuration row is missing
    #[error("Collector {0} is not configured")]
    NotConfigured(CollectorKind),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Orchestrator and consolidator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A run of this collector is already in flight
    #[error("Collector {0} is already running")]
    AlreadyRunning(CollectorKind),

    /// A consolidation cycle is already in flight
    #[error("Consolidation is already running")]
    ConsolidationRunning,

    /// Collector has no configuration row
    #[error("Unknown collector: {0}")]
    UnknownCollector(CollectorKind),

    /// Collector is disabled
    #[error("Collector {0} is disabled")]
    CollectorDisabled(CollectorKind),

    /// Shutdown has been requested
    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by the configuration surface
#[derive(Debug, Error)]
pub enum AdminError {
    /// Rejected configuration
    #[error(transparent)]
    Validation(#[from] ScoringError),

    /// Missing entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Orchestration error
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::AlreadyRunning(_) | OrchestratorError::ConsolidationRunning => {
                ApiError::Conflict(err.to_string())
            }
            OrchestratorError::UnknownCollector(_) => ApiError::NotFound(err.to_string()),
            OrchestratorError::CollectorDisabled(_) => ApiError::Validation(err.to_string()),
            OrchestratorError::ShuttingDown => ApiError::Internal(err.to_string()),
            OrchestratorError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Validation(e) => ApiError::Validation(e.to_string()),
            AdminError::NotFound(what) => ApiError::NotFound(what),
            AdminError::Orchestrator(e) => e.into(),
            AdminError::Storage(e) => ApiError::Storage(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Result type alias for admin operations
pub type AdminResult<T> = Result<T, AdminError>;

/// Result type alias for collector runs
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Result type alias for orchestration
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
