//! In-memory storage with switchable write failures, for unit tests.

use super::traits::*;
use super::InMemoryStorage;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbpulse_types::{
    CategoryScore, CollectorConfig, CollectorException, CollectorExecutionLog, CollectorKind,
    ExceptionId, FinalHealthScore, RunId, RunStatus, ServerName, ThresholdRule, TransitionEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Delegates to an [`InMemoryStorage`] unless a failure switch is on.
pub struct FaultyStorage {
    inner: Arc<InMemoryStorage>,
    fail_transitions: AtomicBool,
    fail_terminal_logs: AtomicBool,
}

impl FaultyStorage {
    pub fn new(inner: Arc<InMemoryStorage>) -> Self {
        Self {
            inner,
            fail_transitions: AtomicBool::new(false),
            fail_terminal_logs: AtomicBool::new(false),
        }
    }

    /// Reject final scores that carry a transition.
    pub fn fail_transitions(&self, on: bool) {
        self.fail_transitions.store(on, Ordering::SeqCst);
    }

    /// Reject run log writes past `Running`.
    pub fn fail_terminal_logs(&self, on: bool) {
        self.fail_terminal_logs.store(on, Ordering::SeqCst);
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::Query(format!("injected failure: {}", what))
}

#[async_trait]
impl CollectorConfigStorage for FaultyStorage {
    async fn get_collector_config(
        &self,
        kind: CollectorKind,
    ) -> StorageResult<Option<CollectorConfig>> {
        self.inner.get_collector_config(kind).await
    }

    async fn list_collector_configs(&self) -> StorageResult<Vec<CollectorConfig>> {
        self.inner.list_collector_configs().await
    }

    async fn upsert_collector_config(&self, config: CollectorConfig) -> StorageResult<()> {
        self.inner.upsert_collector_config(config).await
    }

    async fn update_collector_settings(
        &self,
        config: CollectorConfig,
    ) -> StorageResult<Option<CollectorConfig>> {
        self.inner.update_collector_settings(config).await
    }

    async fn record_collector_run(
        &self,
        kind: CollectorKind,
        started_at: DateTime<Utc>,
        processed: u32,
        last_error: Option<String>,
    ) -> StorageResult<bool> {
        self.inner
            .record_collector_run(kind, started_at, processed, last_error)
            .await
    }
}

#[async_trait]
impl RuleStorage for FaultyStorage {
    async fn get_rules(&self, kind: CollectorKind) -> StorageResult<Option<Vec<ThresholdRule>>> {
        self.inner.get_rules(kind).await
    }

    async fn replace_rules(
        &self,
        kind: CollectorKind,
        rules: Vec<ThresholdRule>,
    ) -> StorageResult<()> {
        self.inner.replace_rules(kind, rules).await
    }
}

#[async_trait]
impl ExceptionStorage for FaultyStorage {
    async fn get_exception(&self, id: &ExceptionId) -> StorageResult<Option<CollectorException>> {
        self.inner.get_exception(id).await
    }

    async fn list_exceptions(
        &self,
        kind: Option<CollectorKind>,
    ) -> StorageResult<Vec<CollectorException>> {
        self.inner.list_exceptions(kind).await
    }

    async fn insert_exception(&self, exception: CollectorException) -> StorageResult<()> {
        self.inner.insert_exception(exception).await
    }

    async fn delete_exception(&self, id: &ExceptionId) -> StorageResult<bool> {
        self.inner.delete_exception(id).await
    }
}

#[async_trait]
impl ExecutionLogStorage for FaultyStorage {
    async fn upsert_execution_log(&self, log: CollectorExecutionLog) -> StorageResult<()> {
        if log.status != RunStatus::Running && self.fail_terminal_logs.load(Ordering::SeqCst) {
            return Err(injected("execution log"));
        }
        self.inner.upsert_execution_log(log).await
    }

    async fn get_execution_log(
        &self,
        run_id: &RunId,
    ) -> StorageResult<Option<CollectorExecutionLog>> {
        self.inner.get_execution_log(run_id).await
    }

    async fn list_execution_logs(
        &self,
        kind: CollectorKind,
        limit: usize,
    ) -> StorageResult<Vec<CollectorExecutionLog>> {
        self.inner.list_execution_logs(kind, limit).await
    }
}

#[async_trait]
impl ScoreStorage for FaultyStorage {
    async fn insert_category_score(&self, score: CategoryScore) -> StorageResult<()> {
        self.inner.insert_category_score(score).await
    }

    async fn latest_category_scores(
        &self,
        server: &ServerName,
    ) -> StorageResult<Vec<CategoryScore>> {
        self.inner.latest_category_scores(server).await
    }

    async fn list_scored_servers(&self) -> StorageResult<Vec<ServerName>> {
        self.inner.list_scored_servers().await
    }

    async fn insert_final_score(
        &self,
        score: FinalHealthScore,
        transition: Option<TransitionEvent>,
    ) -> StorageResult<()> {
        if transition.is_some() && self.fail_transitions.load(Ordering::SeqCst) {
            return Err(injected("transition"));
        }
        self.inner.insert_final_score(score, transition).await
    }

    async fn latest_final_score(
        &self,
        server: &ServerName,
    ) -> StorageResult<Option<FinalHealthScore>> {
        self.inner.latest_final_score(server).await
    }

    async fn latest_final_scores(&self) -> StorageResult<Vec<FinalHealthScore>> {
        self.inner.latest_final_scores().await
    }
}

#[async_trait]
impl TransitionStorage for FaultyStorage {
    async fn list_transitions(&self, limit: usize) -> StorageResult<Vec<TransitionEvent>> {
        self.inner.list_transitions(limit).await
    }

    async fn list_transitions_for_server(
        &self,
        server: &ServerName,
        limit: usize,
    ) -> StorageResult<Vec<TransitionEvent>> {
        self.inner.list_transitions_for_server(server, limit).await
    }
}

impl Storage for FaultyStorage {}
