//! Collector orchestration: one timer task per enabled collector.
//!
//! Runs of the same kind never overlap. A tick or trigger that finds a run
//! in flight is rejected, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dbpulse_types::{CollectorExecutionLog, CollectorKind, RunId, TriggerKind, MIN_INTERVAL_SECS};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::collectors::CollectorRunner;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::storage::Storage;

/// Schedules collectors and enforces single-flight per kind.
pub struct CollectorOrchestrator {
    storage: Arc<dyn Storage>,
    runner: CollectorRunner,
    in_flight: Arc<DashMap<CollectorKind, RunId>>,
    idle: Arc<Notify>,
    timers: DashMap<CollectorKind, JoinHandle<()>>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

/// Releases the single-flight slot of a kind when dropped.
struct FlightGuard {
    kind: CollectorKind,
    in_flight: Arc<DashMap<CollectorKind, RunId>>,
    idle: Arc<Notify>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.kind);
        self.idle.notify_waiters();
    }
}

impl CollectorOrchestrator {
    pub fn new(storage: Arc<dyn Storage>, runner: CollectorRunner) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            storage,
            runner,
            in_flight: Arc::new(DashMap::new()),
            idle: Arc::new(Notify::new()),
            timers: DashMap::new(),
            started: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    /// Start a timer for every enabled collector.
    ///
    /// Returns the number of timers started.
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> OrchestratorResult<usize> {
        if self.is_shutting_down() {
            return Err(OrchestratorError::ShuttingDown);
        }
        self.started.store(true, Ordering::Release);

        let mut started = 0;
        for config in self.storage.list_collector_configs().await? {
            if config.enabled && self.ensure_timer(config.kind) {
                started += 1;
            }
        }

        info!(timers = started, "Collector orchestrator started");
        Ok(started)
    }

    /// Start timers for collectors enabled since the last start.
    ///
    /// A no-op until [`start`](Self::start) has been called.
    pub async fn refresh(self: &Arc<Self>) -> OrchestratorResult<usize> {
        if self.is_shutting_down() || !self.started.load(Ordering::Acquire) {
            return Ok(0);
        }

        let mut started = 0;
        for config in self.storage.list_collector_configs().await? {
            if config.enabled && self.ensure_timer(config.kind) {
                started += 1;
            }
        }

        if started > 0 {
            info!(timers = started, "Collector timers refreshed");
        }
        Ok(started)
    }

    /// Stop all timers and wait for in-flight runs.
    ///
    /// Returns `true` when every run finished within `grace`.
    #[instrument(skip(self))]
    pub async fn stop(&self, grace: Duration) -> bool {
        self.shutdown_tx.send_replace(true);

        let drained = tokio::time::timeout(grace, self.wait_idle()).await.is_ok();
        if !drained {
            warn!(
                running = ?self.running_kinds(),
                "Shutdown grace elapsed with runs in flight"
            );
        }

        let kinds: Vec<CollectorKind> = self.timers.iter().map(|entry| *entry.key()).collect();
        for kind in kinds {
            if let Some((_, handle)) = self.timers.remove(&kind) {
                if drained {
                    let _ = handle.await;
                } else {
                    handle.abort();
                }
            }
        }

        info!(drained, "Collector orchestrator stopped");
        drained
    }

    /// Run `kind` now, outside its interval.
    ///
    /// The run executes in the background; its id is returned immediately.
    #[instrument(skip(self))]
    pub async fn trigger_now(self: &Arc<Self>, kind: CollectorKind) -> OrchestratorResult<RunId> {
        if self.is_shutting_down() {
            return Err(OrchestratorError::ShuttingDown);
        }

        let config = self
            .storage
            .get_collector_config(kind)
            .await?
            .ok_or(OrchestratorError::UnknownCollector(kind))?;
        if !config.enabled {
            return Err(OrchestratorError::CollectorDisabled(kind));
        }

        let log = CollectorExecutionLog::start(kind, TriggerKind::Manual);
        let run_id = log.run_id;
        let guard = self
            .try_acquire(kind, run_id)
            .ok_or(OrchestratorError::AlreadyRunning(kind))?;

        let runner = self.runner.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = runner.execute(log).await {
                error!(
                    kind = %kind,
                    run_id = %run_id,
                    error = %e,
                    "Manual run could not be recorded"
                );
            }
        });

        info!(kind = %kind, run_id = %run_id, "Manual run triggered");
        Ok(run_id)
    }

    /// Whether a run of `kind` is in flight.
    pub fn is_running(&self, kind: CollectorKind) -> bool {
        self.in_flight.contains_key(&kind)
    }

    /// Run id of the in-flight run of `kind`.
    pub fn current_run(&self, kind: CollectorKind) -> Option<RunId> {
        self.in_flight.get(&kind).map(|entry| *entry.value())
    }

    /// Kinds with a run in flight, in declared order.
    pub fn running_kinds(&self) -> Vec<CollectorKind> {
        let mut kinds: Vec<CollectorKind> =
            self.in_flight.iter().map(|entry| *entry.key()).collect();
        kinds.sort();
        kinds
    }

    /// Kinds with a live timer, in declared order.
    pub fn scheduled_kinds(&self) -> Vec<CollectorKind> {
        let mut kinds: Vec<CollectorKind> = self
            .timers
            .iter()
            .filter(|entry| !entry.value().is_finished())
            .map(|entry| *entry.key())
            .collect();
        kinds.sort();
        kinds
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn try_acquire(&self, kind: CollectorKind, run_id: RunId) -> Option<FlightGuard> {
        match self.in_flight.entry(kind) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(run_id);
                Some(FlightGuard {
                    kind,
                    in_flight: self.in_flight.clone(),
                    idle: self.idle.clone(),
                })
            }
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.is_empty() {
                return;
            }
            notified.await;
        }
    }

    // Returns true when a new timer task was spawned.
    fn ensure_timer(self: &Arc<Self>, kind: CollectorKind) -> bool {
        match self.timers.entry(kind) {
            Entry::Occupied(mut existing) => {
                if !existing.get().is_finished() {
                    return false;
                }
                existing.insert(self.spawn_timer(kind));
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(self.spawn_timer(kind));
                true
            }
        }
    }

    fn spawn_timer(self: &Arc<Self>, kind: CollectorKind) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!(kind = %kind, "Collector timer started");

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let wait = match orchestrator.storage.get_collector_config(kind).await {
                    Ok(Some(config)) if config.enabled => {
                        orchestrator.run_scheduled(kind).await;
                        orchestrator.next_wait(kind).await
                    }
                    Ok(Some(_)) => {
                        info!(kind = %kind, "Collector disabled, timer stopping");
                        break;
                    }
                    Ok(None) => {
                        warn!(kind = %kind, "Collector configuration missing, timer stopping");
                        break;
                    }
                    Err(e) => {
                        error!(kind = %kind, error = %e, "Failed to read collector configuration");
                        Duration::from_secs(MIN_INTERVAL_SECS)
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            debug!(kind = %kind, "Collector timer exited");
        })
    }

    async fn run_scheduled(&self, kind: CollectorKind) {
        let log = CollectorExecutionLog::start(kind, TriggerKind::Scheduled);
        let Some(_guard) = self.try_acquire(kind, log.run_id) else {
            debug!(kind = %kind, "Run already in flight, skipping tick");
            return;
        };
        if self.is_shutting_down() {
            return;
        }

        if let Err(e) = self.runner.execute(log).await {
            error!(kind = %kind, error = %e, "Scheduled run could not be recorded");
        }
    }

    // Interval edits apply from the next sleep.
    async fn next_wait(&self, kind: CollectorKind) -> Duration {
        let secs = match self.storage.get_collector_config(kind).await {
            Ok(Some(config)) => config.interval_secs,
            _ => MIN_INTERVAL_SECS,
        };
        Duration::from_secs(secs.max(MIN_INTERVAL_SECS))
    }
}
