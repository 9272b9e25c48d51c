//! In-memory storage implementation

use super::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbpulse_types::{
    CategoryScore, CollectorConfig, CollectorException, CollectorExecutionLog, CollectorKind,
    ExceptionId, FinalHealthScore, RunId, ServerName, ThresholdRule, TransitionEvent,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for development and testing
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    configs: Arc<RwLock<BTreeMap<CollectorKind, CollectorConfig>>>,
    rules: Arc<RwLock<HashMap<CollectorKind, Vec<ThresholdRule>>>>,
    exceptions: Arc<RwLock<HashMap<ExceptionId, CollectorException>>>,
    executions: Arc<RwLock<Vec<CollectorExecutionLog>>>,
    category_scores: Arc<RwLock<Vec<CategoryScore>>>,
    latest_categories: Arc<RwLock<BTreeMap<ServerName, BTreeMap<CollectorKind, CategoryScore>>>>,
    final_scores: Arc<RwLock<Vec<FinalHealthScore>>>,
    latest_finals: Arc<RwLock<BTreeMap<ServerName, FinalHealthScore>>>,
    transitions: Arc<RwLock<Vec<TransitionEvent>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of category score rows ever written
    pub async fn category_score_count(&self) -> usize {
        self.category_scores.read().await.len()
    }

    /// Number of final score rows ever written
    pub async fn final_score_count(&self) -> usize {
        self.final_scores.read().await.len()
    }
}

#[async_trait]
impl CollectorConfigStorage for InMemoryStorage {
    async fn get_collector_config(
        &self,
        kind: CollectorKind,
    ) -> StorageResult<Option<CollectorConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.get(&kind).cloned())
    }

    async fn list_collector_configs(&self) -> StorageResult<Vec<CollectorConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.values().cloned().collect())
    }

    async fn upsert_collector_config(&self, config: CollectorConfig) -> StorageResult<()> {
        let mut configs = self.configs.write().await;
        configs.insert(config.kind, config);
        Ok(())
    }

    async fn update_collector_settings(
        &self,
        config: CollectorConfig,
    ) -> StorageResult<Option<CollectorConfig>> {
        let mut configs = self.configs.write().await;
        let Some(existing) = configs.get_mut(&config.kind) else {
            return Ok(None);
        };
        existing.enabled = config.enabled;
        existing.interval_secs = config.interval_secs;
        existing.weight = config.weight;
        existing.parallel_degree = config.parallel_degree;
        existing.baseline_score = config.baseline_score;
        Ok(Some(existing.clone()))
    }

    async fn record_collector_run(
        &self,
        kind: CollectorKind,
        started_at: DateTime<Utc>,
        processed: u32,
        last_error: Option<String>,
    ) -> StorageResult<bool> {
        let mut configs = self.configs.write().await;
        match configs.get_mut(&kind) {
            Some(existing) => {
                existing.record_run(started_at, processed, last_error);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RuleStorage for InMemoryStorage {
    async fn get_rules(&self, kind: CollectorKind) -> StorageResult<Option<Vec<ThresholdRule>>> {
        let rules = self.rules.read().await;
        Ok(rules.get(&kind).cloned())
    }

    async fn replace_rules(
        &self,
        kind: CollectorKind,
        new_rules: Vec<ThresholdRule>,
    ) -> StorageResult<()> {
        let mut rules = self.rules.write().await;
        rules.insert(kind, new_rules);
        Ok(())
    }
}

#[async_trait]
impl ExceptionStorage for InMemoryStorage {
    async fn get_exception(&self, id: &ExceptionId) -> StorageResult<Option<CollectorException>> {
        let exceptions = self.exceptions.read().await;
        Ok(exceptions.get(id).cloned())
    }

    async fn list_exceptions(
        &self,
        kind: Option<CollectorKind>,
    ) -> StorageResult<Vec<CollectorException>> {
        let exceptions = self.exceptions.read().await;
        let mut listed: Vec<CollectorException> = exceptions
            .values()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(listed)
    }

    async fn insert_exception(&self, exception: CollectorException) -> StorageResult<()> {
        let mut exceptions = self.exceptions.write().await;
        exceptions.insert(exception.id, exception);
        Ok(())
    }

    async fn delete_exception(&self, id: &ExceptionId) -> StorageResult<bool> {
        let mut exceptions = self.exceptions.write().await;
        Ok(exceptions.remove(id).is_some())
    }
}

#[async_trait]
impl ExecutionLogStorage for InMemoryStorage {
    async fn upsert_execution_log(&self, log: CollectorExecutionLog) -> StorageResult<()> {
        let mut executions = self.executions.write().await;
        match executions.iter_mut().find(|existing| existing.run_id == log.run_id) {
            Some(existing) => *existing = log,
            None => executions.push(log),
        }
        Ok(())
    }

    async fn get_execution_log(
        &self,
        run_id: &RunId,
    ) -> StorageResult<Option<CollectorExecutionLog>> {
        let executions = self.executions.read().await;
        Ok(executions.iter().find(|log| &log.run_id == run_id).cloned())
    }

    async fn list_execution_logs(
        &self,
        kind: CollectorKind,
        limit: usize,
    ) -> StorageResult<Vec<CollectorExecutionLog>> {
        let executions = self.executions.read().await;
        Ok(executions
            .iter()
            .rev()
            .filter(|log| log.kind == kind)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScoreStorage for InMemoryStorage {
    async fn insert_category_score(&self, score: CategoryScore) -> StorageResult<()> {
        {
            let mut latest = self.latest_categories.write().await;
            let per_server = latest.entry(score.server.clone()).or_default();
            let newer = per_server
                .get(&score.kind)
                .map_or(true, |current| score.scored_at >= current.scored_at);
            if newer {
                per_server.insert(score.kind, score.clone());
            }
        }
        let mut history = self.category_scores.write().await;
        history.push(score);
        Ok(())
    }

    async fn latest_category_scores(
        &self,
        server: &ServerName,
    ) -> StorageResult<Vec<CategoryScore>> {
        let latest = self.latest_categories.read().await;
        Ok(latest
            .get(server)
            .map(|per_server| per_server.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_scored_servers(&self) -> StorageResult<Vec<ServerName>> {
        let latest = self.latest_categories.read().await;
        Ok(latest.keys().cloned().collect())
    }

    async fn insert_final_score(
        &self,
        score: FinalHealthScore,
        transition: Option<TransitionEvent>,
    ) -> StorageResult<()> {
        // All three locks are held so readers never see the score without
        // its transition.
        let mut latest = self.latest_finals.write().await;
        let mut history = self.final_scores.write().await;
        let mut transitions = self.transitions.write().await;

        latest.insert(score.server.clone(), score.clone());
        history.push(score);
        transitions.extend(transition);
        Ok(())
    }

    async fn latest_final_score(
        &self,
        server: &ServerName,
    ) -> StorageResult<Option<FinalHealthScore>> {
        let latest = self.latest_finals.read().await;
        Ok(latest.get(server).cloned())
    }

    async fn latest_final_scores(&self) -> StorageResult<Vec<FinalHealthScore>> {
        let latest = self.latest_finals.read().await;
        Ok(latest.values().cloned().collect())
    }
}

#[async_trait]
impl TransitionStorage for InMemoryStorage {
    async fn list_transitions(&self, limit: usize) -> StorageResult<Vec<TransitionEvent>> {
        let transitions = self.transitions.read().await;
        Ok(transitions.iter().rev().take(limit).cloned().collect())
    }

    async fn list_transitions_for_server(
        &self,
        server: &ServerName,
        limit: usize,
    ) -> StorageResult<Vec<TransitionEvent>> {
        let transitions = self.transitions.read().await;
        Ok(transitions
            .iter()
            .rev()
            .filter(|e| &e.server == server)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl Storage for InMemoryStorage {}
