//! Shared fixtures for daemon integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dbpulse_daemon::collectors::{CollectorRunner, MetricSource, SourceRegistry, StaticInventory};
use dbpulse_daemon::error::{CollectorError, CollectorResult};
use dbpulse_daemon::storage::{CollectorConfigStorage, InMemoryStorage};
use dbpulse_daemon::{AdminService, CollectorOrchestrator, HealthConsolidator};
use dbpulse_scoring::{catalog, ConsolidationConfig};
use dbpulse_types::{
    CollectorKind, ComparisonOp, Measurement, MonitoredInstance, RuleAction, ServerName,
    ThresholdRule,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// Metric sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Readings(Vec<(String, f64)>),
    Failure(String),
}

/// Metric source whose readings are set per server by the test.
pub struct ScriptedSource {
    kind: CollectorKind,
    scripts: Mutex<HashMap<ServerName, Script>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    pub fn new(kind: CollectorKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            scripts: Mutex::new(HashMap::new()),
            gate: None,
        })
    }

    /// Source that blocks every measurement until the gate has permits.
    pub fn gated(kind: CollectorKind, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            scripts: Mutex::new(HashMap::new()),
            gate: Some(gate),
        })
    }

    pub fn set(&self, server: &str, readings: &[(&str, f64)]) {
        let readings = readings
            .iter()
            .map(|(group, value)| (group.to_string(), *value))
            .collect();
        self.scripts
            .lock()
            .unwrap()
            .insert(ServerName::new(server), Script::Readings(readings));
    }

    pub fn fail(&self, server: &str, reason: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(ServerName::new(server), Script::Failure(reason.to_string()));
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    fn kind(&self) -> CollectorKind {
        self.kind
    }

    async fn measure(&self, instance: &MonitoredInstance) -> CollectorResult<Measurement> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| CollectorError::Measurement {
                server: instance.server.clone(),
                reason: e.to_string(),
            })?;
        }

        let script = self.scripts.lock().unwrap().get(&instance.server).cloned();
        match script {
            Some(Script::Readings(readings)) => Ok(readings
                .into_iter()
                .fold(Measurement::new(), |m, (group, value)| m.with_reading(group, value))),
            Some(Script::Failure(reason)) => Err(CollectorError::Measurement {
                server: instance.server.clone(),
                reason,
            }),
            None => Err(CollectorError::Measurement {
                server: instance.server.clone(),
                reason: "no reading scripted".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Daemon components wired against the in-memory store.
pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub runner: CollectorRunner,
    pub orchestrator: Arc<CollectorOrchestrator>,
    pub consolidator: Arc<HealthConsolidator>,
    pub admin: AdminService,
}

impl Harness {
    /// Configure only the given collectors, with the given weights.
    pub async fn new(
        servers: &[&str],
        sources: &[Arc<ScriptedSource>],
        weights: &[(CollectorKind, f64)],
    ) -> Self {
        Self::with_scoring(servers, sources, weights, ConsolidationConfig::default()).await
    }

    pub async fn with_scoring(
        servers: &[&str],
        sources: &[Arc<ScriptedSource>],
        weights: &[(CollectorKind, f64)],
        scoring: ConsolidationConfig,
    ) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        for (kind, weight) in weights {
            let mut config = catalog::definition(*kind).default_config();
            config.weight = *weight;
            storage.upsert_collector_config(config).await.unwrap();
        }

        let inventory = StaticInventory::new(
            servers
                .iter()
                .map(|s| MonitoredInstance::new(*s, format!("{}.local", s.to_lowercase())))
                .collect(),
        );
        let registry = sources
            .iter()
            .fold(SourceRegistry::new(), |registry, source| {
                registry.with_source(source.clone() as Arc<dyn MetricSource>)
            });

        let runner = CollectorRunner::new(
            storage.clone(),
            Arc::new(inventory),
            Arc::new(registry),
            Duration::from_secs(5),
        );
        let orchestrator = CollectorOrchestrator::new(storage.clone(), runner.clone());
        let consolidator =
            HealthConsolidator::new(storage.clone(), scoring, Duration::from_secs(300));
        let admin = AdminService::new(storage.clone(), orchestrator.clone(), consolidator.clone());

        Self {
            storage,
            runner,
            orchestrator,
            consolidator,
            admin,
        }
    }

    /// Poll until no run of `kind` is in flight.
    pub async fn wait_idle(&self, kind: CollectorKind) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.orchestrator.is_running(kind) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("collector run did not finish");
    }
}

/// Single-rule set for `kind` on `group`.
pub fn penalty_rule(
    kind: CollectorKind,
    group: &str,
    threshold: f64,
    penalty: f64,
) -> ThresholdRule {
    ThresholdRule::new(
        kind,
        group,
        1,
        ComparisonOp::GreaterThan,
        threshold,
        RuleAction::Penalty,
        penalty,
    )
}
