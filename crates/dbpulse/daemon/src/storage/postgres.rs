//! PostgreSQL storage implementation

use super::traits::*;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbpulse_types::{
    CategoryScore, CollectorConfig, CollectorException, CollectorExecutionLog, CollectorKind,
    ExceptionId, FinalHealthScore, RunId, ServerName, ThresholdRule, TransitionEvent,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use std::time::Duration;

/// PostgreSQL-backed storage
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect to PostgreSQL and initialize schema
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS collector_configs (
                kind TEXT PRIMARY KEY,
                enabled BOOLEAN NOT NULL,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS threshold_rules (
                kind TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS collector_exceptions (
                id UUID PRIMARY KEY,
                kind TEXT NOT NULL,
                server TEXT NOT NULL,
                expires_at TIMESTAMPTZ,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS collector_exceptions_kind_server
            ON collector_exceptions(kind, server);
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS collector_executions (
                run_id UUID PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS collector_executions_kind_started
            ON collector_executions(kind, started_at DESC);
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS category_scores (
                sequence BIGSERIAL PRIMARY KEY,
                server TEXT NOT NULL,
                kind TEXT NOT NULL,
                run_id UUID NOT NULL,
                score DOUBLE PRECISION NOT NULL,
                scored_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS category_scores_latest
            ON category_scores(server, kind, scored_at DESC);
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS final_scores (
                sequence BIGSERIAL PRIMARY KEY,
                server TEXT NOT NULL,
                final_score DOUBLE PRECISION NOT NULL,
                status TEXT NOT NULL,
                computed_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS final_scores_latest
            ON final_scores(server, computed_at DESC);
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS transitions (
                id UUID PRIMARY KEY,
                server TEXT NOT NULL,
                cause TEXT NOT NULL,
                detected_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS transitions_detected_at
            ON transitions(detected_at DESC);
            "#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        Ok(())
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StorageError> {
        serde_json::to_value(value)
            .map_err(|e| StorageError::InvalidData(format!("json serialize error: {}", e)))
    }

    fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StorageError> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::InvalidData(format!("json deserialize error: {}", e)))
    }

    fn decode_row<T: serde::de::DeserializeOwned>(row: PgRow) -> Result<T, StorageError> {
        let data: Value = row
            .try_get("data")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Self::from_json(data)
    }

    fn decode_rows<T: serde::de::DeserializeOwned>(
        rows: Vec<PgRow>,
    ) -> Result<Vec<T>, StorageError> {
        rows.into_iter().map(Self::decode_row).collect()
    }
}

#[async_trait]
impl CollectorConfigStorage for PostgresStorage {
    async fn get_collector_config(
        &self,
        kind: CollectorKind,
    ) -> StorageResult<Option<CollectorConfig>> {
        let row = sqlx::query("SELECT data FROM collector_configs WHERE kind = $1")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(Self::decode_row).transpose()
    }

    async fn list_collector_configs(&self) -> StorageResult<Vec<CollectorConfig>> {
        let rows = sqlx::query("SELECT data FROM collector_configs")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        let mut configs: Vec<CollectorConfig> = Self::decode_rows(rows)?;
        configs.sort_by_key(|c| c.kind);
        Ok(configs)
    }

    async fn upsert_collector_config(&self, config: CollectorConfig) -> StorageResult<()> {
        let data = Self::to_json(&config)?;

        sqlx::query(
            r#"
            INSERT INTO collector_configs (kind, enabled, data, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind)
            DO UPDATE SET
                enabled = EXCLUDED.enabled,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(config.kind.as_str())
        .bind(config.enabled)
        .bind(data)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn update_collector_settings(
        &self,
        config: CollectorConfig,
    ) -> StorageResult<Option<CollectorConfig>> {
        let row = sqlx::query(
            r#"
            UPDATE collector_configs
            SET
                enabled = $2,
                data = data || jsonb_build_object(
                    'enabled', $2::boolean,
                    'interval_secs', $3::bigint,
                    'weight', $4::double precision,
                    'parallel_degree', $5::bigint,
                    'baseline_score', $6::double precision
                ),
                updated_at = $7
            WHERE kind = $1
            RETURNING data
            "#,
        )
        .bind(config.kind.as_str())
        .bind(config.enabled)
        .bind(config.interval_secs as i64)
        .bind(config.weight)
        .bind(config.parallel_degree as i64)
        .bind(config.baseline_score)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(Self::decode_row).transpose()
    }

    async fn record_collector_run(
        &self,
        kind: CollectorKind,
        started_at: DateTime<Utc>,
        processed: u32,
        last_error: Option<String>,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE collector_configs
            SET
                data = data || jsonb_build_object(
                    'last_run_at', $2::timestamptz,
                    'last_instances_processed', $3::bigint,
                    'last_error', $4::text
                ),
                updated_at = $5
            WHERE kind = $1
            "#,
        )
        .bind(kind.as_str())
        .bind(started_at)
        .bind(processed as i64)
        .bind(last_error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RuleStorage for PostgresStorage {
    async fn get_rules(&self, kind: CollectorKind) -> StorageResult<Option<Vec<ThresholdRule>>> {
        let row = sqlx::query("SELECT data FROM threshold_rules WHERE kind = $1")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(Self::decode_row).transpose()
    }

    async fn replace_rules(
        &self,
        kind: CollectorKind,
        rules: Vec<ThresholdRule>,
    ) -> StorageResult<()> {
        let data = Self::to_json(&rules)?;

        sqlx::query(
            r#"
            INSERT INTO threshold_rules (kind, data, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (kind)
            DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(kind.as_str())
        .bind(data)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ExceptionStorage for PostgresStorage {
    async fn get_exception(&self, id: &ExceptionId) -> StorageResult<Option<CollectorException>> {
        let row = sqlx::query("SELECT data FROM collector_exceptions WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(Self::decode_row).transpose()
    }

    async fn list_exceptions(
        &self,
        kind: Option<CollectorKind>,
    ) -> StorageResult<Vec<CollectorException>> {
        let rows = match kind {
            Some(kind) => sqlx::query(
                "SELECT data FROM collector_exceptions WHERE kind = $1 ORDER BY created_at",
            )
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query("SELECT data FROM collector_exceptions ORDER BY created_at")
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Self::decode_rows(rows)
    }

    async fn insert_exception(&self, exception: CollectorException) -> StorageResult<()> {
        let data = Self::to_json(&exception)?;

        sqlx::query(
            r#"
            INSERT INTO collector_exceptions (id, kind, server, expires_at, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*exception.id.as_uuid())
        .bind(exception.kind.as_str())
        .bind(exception.server.as_str())
        .bind(exception.expires_at)
        .bind(data)
        .bind(exception.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete_exception(&self, id: &ExceptionId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM collector_exceptions WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ExecutionLogStorage for PostgresStorage {
    async fn upsert_execution_log(&self, log: CollectorExecutionLog) -> StorageResult<()> {
        let data = Self::to_json(&log)?;

        sqlx::query(
            r#"
            INSERT INTO collector_executions (run_id, kind, status, started_at, data)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (run_id)
            DO UPDATE SET
                status = EXCLUDED.status,
                data = EXCLUDED.data
            "#,
        )
        .bind(*log.run_id.as_uuid())
        .bind(log.kind.as_str())
        .bind(log.status.to_string())
        .bind(log.started_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_execution_log(
        &self,
        run_id: &RunId,
    ) -> StorageResult<Option<CollectorExecutionLog>> {
        let row = sqlx::query("SELECT data FROM collector_executions WHERE run_id = $1")
            .bind(*run_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(Self::decode_row).transpose()
    }

    async fn list_execution_logs(
        &self,
        kind: CollectorKind,
        limit: usize,
    ) -> StorageResult<Vec<CollectorExecutionLog>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM collector_executions
            WHERE kind = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(kind.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Self::decode_rows(rows)
    }
}

#[async_trait]
impl ScoreStorage for PostgresStorage {
    async fn insert_category_score(&self, score: CategoryScore) -> StorageResult<()> {
        let data = Self::to_json(&score)?;

        sqlx::query(
            r#"
            INSERT INTO category_scores (server, kind, run_id, score, scored_at, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(score.server.as_str())
        .bind(score.kind.as_str())
        .bind(*score.run_id.as_uuid())
        .bind(score.score)
        .bind(score.scored_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn latest_category_scores(
        &self,
        server: &ServerName,
    ) -> StorageResult<Vec<CategoryScore>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (kind) data
            FROM category_scores
            WHERE server = $1
            ORDER BY kind, scored_at DESC, sequence DESC
            "#,
        )
        .bind(server.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        let mut scores: Vec<CategoryScore> = Self::decode_rows(rows)?;
        scores.sort_by_key(|s| s.kind);
        Ok(scores)
    }

    async fn list_scored_servers(&self) -> StorageResult<Vec<ServerName>> {
        let rows = sqlx::query("SELECT DISTINCT server FROM category_scores ORDER BY server")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let server: String = row
                    .try_get("server")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Ok(ServerName::new(server))
            })
            .collect()
    }

    async fn insert_final_score(
        &self,
        score: FinalHealthScore,
        transition: Option<TransitionEvent>,
    ) -> StorageResult<()> {
        let data = Self::to_json(&score)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO final_scores (server, final_score, status, computed_at, data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(score.server.as_str())
        .bind(score.final_score)
        .bind(score.status.to_string())
        .bind(score.computed_at)
        .bind(data)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        if let Some(event) = transition {
            let data = Self::to_json(&event)?;

            sqlx::query(
                r#"
                INSERT INTO transitions (id, server, cause, detected_at, data)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(*event.id.as_uuid())
            .bind(event.server.as_str())
            .bind(event.cause.as_str())
            .bind(event.detected_at)
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    async fn latest_final_score(
        &self,
        server: &ServerName,
    ) -> StorageResult<Option<FinalHealthScore>> {
        let row = sqlx::query(
            r#"
            SELECT data FROM final_scores
            WHERE server = $1
            ORDER BY computed_at DESC, sequence DESC
            LIMIT 1
            "#,
        )
        .bind(server.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(Self::decode_row).transpose()
    }

    async fn latest_final_scores(&self) -> StorageResult<Vec<FinalHealthScore>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (server) data
            FROM final_scores
            ORDER BY server, computed_at DESC, sequence DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Self::decode_rows(rows)
    }
}

#[async_trait]
impl TransitionStorage for PostgresStorage {
    async fn list_transitions(&self, limit: usize) -> StorageResult<Vec<TransitionEvent>> {
        let rows = sqlx::query("SELECT data FROM transitions ORDER BY detected_at DESC LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Self::decode_rows(rows)
    }

    async fn list_transitions_for_server(
        &self,
        server: &ServerName,
        limit: usize,
    ) -> StorageResult<Vec<TransitionEvent>> {
        let rows = sqlx::query(
            "SELECT data FROM transitions WHERE server = $1 ORDER BY detected_at DESC LIMIT $2",
        )
        .bind(server.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Self::decode_rows(rows)
    }
}

impl Storage for PostgresStorage {}
