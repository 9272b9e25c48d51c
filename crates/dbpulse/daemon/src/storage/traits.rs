//! Storage trait definitions

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbpulse_types::{
    CategoryScore, CollectorConfig, CollectorException, CollectorExecutionLog, CollectorKind,
    ExceptionId, FinalHealthScore, RunId, ServerName, ThresholdRule, TransitionEvent,
};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Combined storage trait
#[async_trait]
pub trait Storage:
    CollectorConfigStorage
    + RuleStorage
    + ExceptionStorage
    + ExecutionLogStorage
    + ScoreStorage
    + TransitionStorage
    + Send
    + Sync
{
}

/// Storage for collector configurations
#[async_trait]
pub trait CollectorConfigStorage: Send + Sync {
    /// Get the configuration of one collector
    async fn get_collector_config(&self, kind: CollectorKind)
        -> StorageResult<Option<CollectorConfig>>;

    /// List all collector configurations in declared kind order
    async fn list_collector_configs(&self) -> StorageResult<Vec<CollectorConfig>>;

    /// Create or update a collector configuration
    async fn upsert_collector_config(&self, config: CollectorConfig) -> StorageResult<()>;

    /// Overwrite the admin-editable fields of an existing row, keeping its
    /// last-run fields. Returns the stored row, `None` when absent.
    async fn update_collector_settings(
        &self,
        config: CollectorConfig,
    ) -> StorageResult<Option<CollectorConfig>>;

    /// Record a run outcome on an existing row, leaving every other field
    /// untouched. Returns `false` when the row is absent.
    async fn record_collector_run(
        &self,
        kind: CollectorKind,
        started_at: DateTime<Utc>,
        processed: u32,
        last_error: Option<String>,
    ) -> StorageResult<bool>;
}

/// Storage for threshold rules
#[async_trait]
pub trait RuleStorage: Send + Sync {
    /// Get the rules of one collector; `None` when never written
    async fn get_rules(&self, kind: CollectorKind) -> StorageResult<Option<Vec<ThresholdRule>>>;

    /// Replace the rule set of one collector
    async fn replace_rules(&self, kind: CollectorKind, rules: Vec<ThresholdRule>)
        -> StorageResult<()>;
}

/// Storage for collector exceptions
#[async_trait]
pub trait ExceptionStorage: Send + Sync {
    /// Get an exception by ID
    async fn get_exception(&self, id: &ExceptionId) -> StorageResult<Option<CollectorException>>;

    /// List exceptions, optionally for one collector, expired ones included
    async fn list_exceptions(
        &self,
        kind: Option<CollectorKind>,
    ) -> StorageResult<Vec<CollectorException>>;

    /// Store a new exception
    async fn insert_exception(&self, exception: CollectorException) -> StorageResult<()>;

    /// Delete an exception by ID
    async fn delete_exception(&self, id: &ExceptionId) -> StorageResult<bool>;
}

/// Storage for collector run logs
#[async_trait]
pub trait ExecutionLogStorage: Send + Sync {
    /// Create or update a run log row
    async fn upsert_execution_log(&self, log: CollectorExecutionLog) -> StorageResult<()>;

    /// Get a run log by ID
    async fn get_execution_log(&self, run_id: &RunId)
        -> StorageResult<Option<CollectorExecutionLog>>;

    /// Most recent run logs of one collector, newest first
    async fn list_execution_logs(
        &self,
        kind: CollectorKind,
        limit: usize,
    ) -> StorageResult<Vec<CollectorExecutionLog>>;
}

/// Storage for category and final scores
#[async_trait]
pub trait ScoreStorage: Send + Sync {
    /// Append a category score
    async fn insert_category_score(&self, score: CategoryScore) -> StorageResult<()>;

    /// Latest category score per collector for one server
    async fn latest_category_scores(&self, server: &ServerName)
        -> StorageResult<Vec<CategoryScore>>;

    /// Servers with at least one category score
    async fn list_scored_servers(&self) -> StorageResult<Vec<ServerName>>;

    /// Append a final score and, atomically with it, the transition it
    /// caused
    async fn insert_final_score(
        &self,
        score: FinalHealthScore,
        transition: Option<TransitionEvent>,
    ) -> StorageResult<()>;

    /// Latest final score of one server
    async fn latest_final_score(&self, server: &ServerName)
        -> StorageResult<Option<FinalHealthScore>>;

    /// Latest final score of every server
    async fn latest_final_scores(&self) -> StorageResult<Vec<FinalHealthScore>>;
}

/// Storage for status transitions
#[async_trait]
pub trait TransitionStorage: Send + Sync {
    /// Most recent transitions, newest first
    async fn list_transitions(&self, limit: usize) -> StorageResult<Vec<TransitionEvent>>;

    /// Most recent transitions of one server, newest first
    async fn list_transitions_for_server(
        &self,
        server: &ServerName,
        limit: usize,
    ) -> StorageResult<Vec<TransitionEvent>>;
}
