//! Periodic health-score consolidation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dbpulse_scoring::{
    check_weights, consolidate, ConsolidationConfig, ConsolidationReport, InstanceOutcome,
    SkipReason,
};
use dbpulse_types::{CollectorConfig, ServerName};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::storage::Storage;

/// Combines the latest category scores into final health scores.
pub struct HealthConsolidator {
    storage: Arc<dyn Storage>,
    config: ConsolidationConfig,
    interval: Duration,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Clears the running flag when dropped.
struct CycleGuard(Arc<AtomicBool>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl HealthConsolidator {
    pub fn new(
        storage: Arc<dyn Storage>,
        config: ConsolidationConfig,
        interval: Duration,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            storage,
            config,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            shutdown_tx,
        })
    }

    /// Start the consolidation loop; a no-op when it is already running.
    pub async fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock().await;
        if *self.shutdown_tx.borrow() || handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let consolidator = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(consolidator.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_secs = consolidator.interval.as_secs(),
                "Health consolidator started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match consolidator.run_now().await {
                            Ok(_) => {}
                            Err(OrchestratorError::ConsolidationRunning) => {
                                debug!("Consolidation already running, skipping tick");
                            }
                            Err(e) => error!(error = %e, "Consolidation cycle failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Health consolidator stopped");
        }));
    }

    /// Stop the loop, letting a cycle in progress finish.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Whether a cycle is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Run one cycle now, sharing the single-flight guard with the loop.
    #[instrument(skip(self))]
    pub async fn run_now(&self) -> OrchestratorResult<ConsolidationReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(OrchestratorError::ConsolidationRunning);
        }
        let _guard = CycleGuard(self.running.clone());

        let mut report = ConsolidationReport::new(Utc::now());
        let configs = self.storage.list_collector_configs().await?;
        check_weights(&configs);

        for server in self.storage.list_scored_servers().await? {
            match self.consolidate_server(&server, &configs).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!(server = %server, error = %e, "Failed to consolidate instance");
                }
            }
        }

        report.finish(Utc::now());
        info!(
            scored = report.instances_scored,
            skipped = report.instances_skipped,
            transitions = report.transitions.len(),
            duration_ms = report.duration_ms,
            "Consolidation cycle completed"
        );
        Ok(report)
    }

    async fn consolidate_server(
        &self,
        server: &ServerName,
        configs: &[CollectorConfig],
    ) -> OrchestratorResult<InstanceOutcome> {
        let latest = self.storage.latest_category_scores(server).await?;
        let previous = self.storage.latest_final_score(server).await?;

        let outcome = consolidate(
            server,
            &latest,
            configs,
            &self.config,
            previous.as_ref(),
            Utc::now(),
        );

        match &outcome {
            InstanceOutcome::Scored { score, transition } => {
                self.storage
                    .insert_final_score(score.clone(), transition.clone())
                    .await?;
                if let Some(event) = transition {
                    info!(
                        server = %server,
                        from = %event.previous_status,
                        to = %event.new_status,
                        score = event.new_score,
                        cause = %event.cause,
                        "Health status changed"
                    );
                }
                debug!(
                    server = %server,
                    score = score.final_score,
                    status = %score.status,
                    "Instance consolidated"
                );
            }
            InstanceOutcome::Skipped {
                reason: SkipReason::ZeroWeight,
                ..
            } => {
                warn!(server = %server, "Present categories carry zero weight, instance skipped");
            }
            InstanceOutcome::Skipped {
                reason: SkipReason::NoScores,
                ..
            } => {
                debug!(server = %server, "No scores from enabled collectors");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::FaultyStorage;
    use crate::storage::{
        CollectorConfigStorage, InMemoryStorage, ScoreStorage, TransitionStorage,
    };
    use dbpulse_scoring::catalog;
    use dbpulse_types::{CategoryScore, CollectorKind, HealthStatus, Measurement, RunId};

    fn category(server: &str, kind: CollectorKind, score: f64) -> CategoryScore {
        CategoryScore {
            server: server.into(),
            kind,
            run_id: RunId::generate(),
            score,
            measurement: Measurement::new(),
            fired_rule: None,
            suppressed_by_exception: false,
            notes: Vec::new(),
            scored_at: Utc::now(),
        }
    }

    async fn seeded() -> Arc<InMemoryStorage> {
        let storage = Arc::new(InMemoryStorage::new());
        for kind in [CollectorKind::Cpu, CollectorKind::Io] {
            let mut config = catalog::definition(kind).default_config();
            config.weight = 50.0;
            storage.upsert_collector_config(config).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_cycle_writes_final_scores() {
        let storage = seeded().await;
        storage
            .insert_category_score(category("SQL01", CollectorKind::Cpu, 90.0))
            .await
            .unwrap();
        storage
            .insert_category_score(category("SQL01", CollectorKind::Io, 70.0))
            .await
            .unwrap();

        let consolidator = HealthConsolidator::new(
            storage.clone(),
            ConsolidationConfig::default(),
            Duration::from_secs(300),
        );
        let report = consolidator.run_now().await.unwrap();
        assert_eq!(report.instances_scored, 1);
        assert!(report.transitions.is_empty());

        let score = storage
            .latest_final_score(&"SQL01".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(score.final_score, 80.0);
        assert_eq!(score.status, HealthStatus::Warning);
    }

    #[tokio::test]
    async fn test_second_cycle_emits_transition() {
        let storage = seeded().await;
        storage
            .insert_category_score(category("SQL01", CollectorKind::Cpu, 100.0))
            .await
            .unwrap();
        storage
            .insert_category_score(category("SQL01", CollectorKind::Io, 100.0))
            .await
            .unwrap();
        let consolidator = HealthConsolidator::new(
            storage.clone(),
            ConsolidationConfig::default(),
            Duration::from_secs(300),
        );
        consolidator.run_now().await.unwrap();

        storage
            .insert_category_score(category("SQL01", CollectorKind::Io, 40.0))
            .await
            .unwrap();
        let report = consolidator.run_now().await.unwrap();

        assert_eq!(report.transitions.len(), 1);
        let event = &report.transitions[0];
        assert_eq!(event.previous_status, HealthStatus::Healthy);
        assert_eq!(event.new_status, HealthStatus::Warning);
        assert_eq!(event.cause, CollectorKind::Io);
        assert_eq!(storage.list_transitions(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_transition_write_keeps_previous_status() {
        let inner = seeded().await;
        let storage = Arc::new(FaultyStorage::new(inner.clone()));
        inner
            .insert_category_score(category("SQL01", CollectorKind::Cpu, 100.0))
            .await
            .unwrap();
        let consolidator = HealthConsolidator::new(
            storage.clone(),
            ConsolidationConfig::default(),
            Duration::from_secs(300),
        );
        consolidator.run_now().await.unwrap();

        inner
            .insert_category_score(category("SQL01", CollectorKind::Io, 20.0))
            .await
            .unwrap();
        storage.fail_transitions(true);
        let report = consolidator.run_now().await.unwrap();
        assert!(report.transitions.is_empty());
        assert_eq!(inner.final_score_count().await, 1);
        let kept = inner
            .latest_final_score(&"SQL01".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.status, HealthStatus::Healthy);

        // The bucket change is still pending and gets emitted once writes work.
        storage.fail_transitions(false);
        let report = consolidator.run_now().await.unwrap();
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].previous_status, HealthStatus::Healthy);
        assert_eq!(inner.list_transitions(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_now_is_single_flight() {
        let storage = seeded().await;
        let consolidator = HealthConsolidator::new(
            storage,
            ConsolidationConfig::default(),
            Duration::from_secs(300),
        );

        consolidator.running.store(true, Ordering::Release);
        assert!(matches!(
            consolidator.run_now().await,
            Err(OrchestratorError::ConsolidationRunning)
        ));

        consolidator.running.store(false, Ordering::Release);
        assert!(consolidator.run_now().await.is_ok());
        assert!(!consolidator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_on_interval_and_stops() {
        let storage = seeded().await;
        storage
            .insert_category_score(category("SQL01", CollectorKind::Cpu, 95.0))
            .await
            .unwrap();
        let consolidator = HealthConsolidator::new(
            storage.clone(),
            ConsolidationConfig::default(),
            Duration::from_secs(60),
        );

        consolidator.start().await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        consolidator.stop().await;

        assert_eq!(storage.final_score_count().await, 2);
    }
}
