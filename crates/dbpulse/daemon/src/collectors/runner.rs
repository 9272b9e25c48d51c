//! One collector run: fan out over eligible instances, score, persist.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dbpulse_scoring::{catalog, evaluate, evaluator::MAX_SCORE};
use dbpulse_types::{
    CategoryScore, CollectorExecutionLog, CollectorKind, MonitoredInstance, RunId,
    ThresholdRule, TriggerKind, MAX_PARALLEL_DEGREE,
};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use super::exceptions::ExceptionRegistry;
use super::registry::SourceRegistry;
use super::source::{InstanceProvider, MetricSource};
use crate::error::{CollectorError, CollectorResult};
use crate::storage::Storage;

/// Executes collector runs against the store.
#[derive(Clone)]
pub struct CollectorRunner {
    storage: Arc<dyn Storage>,
    inventory: Arc<dyn InstanceProvider>,
    sources: Arc<SourceRegistry>,
    exceptions: ExceptionRegistry,
    measurement_timeout: Duration,
}

/// Per-run inputs shared by every instance evaluation.
struct RunContext {
    kind: CollectorKind,
    run_id: RunId,
    baseline: f64,
    rules: Vec<ThresholdRule>,
    source: Arc<dyn MetricSource>,
}

/// Counts of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RunTally {
    success: u32,
    errors: u32,
}

impl CollectorRunner {
    pub fn new(
        storage: Arc<dyn Storage>,
        inventory: Arc<dyn InstanceProvider>,
        sources: Arc<SourceRegistry>,
        measurement_timeout: Duration,
    ) -> Self {
        let exceptions = ExceptionRegistry::new(storage.clone());
        Self {
            storage,
            inventory,
            sources,
            exceptions,
            measurement_timeout,
        }
    }

    /// Start and finish a run of `kind`.
    pub async fn run(
        &self,
        kind: CollectorKind,
        trigger: TriggerKind,
    ) -> CollectorResult<CollectorExecutionLog> {
        self.execute(CollectorExecutionLog::start(kind, trigger)).await
    }

    /// Drive an opened log row to a terminal status.
    ///
    /// Collector-level failures end up in the returned log as `Failed`; an
    /// `Err` means the log itself could not be written.
    #[instrument(
        skip(self, log),
        fields(kind = %log.kind, run_id = %log.run_id, trigger = %log.trigger)
    )]
    pub async fn execute(
        &self,
        mut log: CollectorExecutionLog,
    ) -> CollectorResult<CollectorExecutionLog> {
        self.storage.upsert_execution_log(log.clone()).await?;
        info!("Collector run started");

        let outcome = self.collect(log.kind, log.run_id).await;
        let (processed, last_error) = match outcome {
            Ok(tally) => {
                log.complete(tally.success, tally.errors);
                info!(
                    success = tally.success,
                    errors = tally.errors,
                    duration_ms = log.duration_ms,
                    "Collector run completed"
                );
                (tally.success + tally.errors, None)
            }
            Err(e) => {
                warn!(error = %e, "Collector run failed");
                log.fail(e.to_string());
                (0, Some(e.to_string()))
            }
        };

        if let Err(e) = self.storage.upsert_execution_log(log.clone()).await {
            error!(error = %e, "Terminal run log not written, row left Running");
            let last_error = format!("run {} could not be finalized: {}", log.run_id, e);
            self.record_run(&log, processed, Some(last_error)).await?;
            return Err(e.into());
        }
        self.record_run(&log, processed, last_error).await?;
        Ok(log)
    }

    async fn collect(&self, kind: CollectorKind, run_id: RunId) -> CollectorResult<RunTally> {
        let config = self
            .storage
            .get_collector_config(kind)
            .await?
            .ok_or(CollectorError::NotConfigured(kind))?;
        let source = self.sources.get(kind).ok_or(CollectorError::NoSource(kind))?;
        let rules = match self.storage.get_rules(kind).await? {
            Some(rules) => rules,
            None => catalog::default_rules(kind),
        };

        let eligible: Vec<MonitoredInstance> = self
            .inventory
            .list_instances()
            .await?
            .into_iter()
            .filter(|instance| instance.is_eligible_for(kind))
            .collect();

        debug!(
            instances = eligible.len(),
            parallel_degree = config.parallel_degree,
            rules = rules.len(),
            "Dispatching instance evaluations"
        );

        let context = Arc::new(RunContext {
            kind,
            run_id,
            baseline: config.baseline_score,
            rules,
            source,
        });
        let degree = config.parallel_degree.clamp(1, MAX_PARALLEL_DEGREE);

        let results: Vec<CollectorResult<()>> = stream::iter(eligible)
            .map(|instance| {
                let runner = self.clone();
                let context = context.clone();
                async move { runner.score_instance(&context, instance).await }
            })
            .buffer_unordered(degree)
            .collect()
            .await;

        let mut tally = RunTally::default();
        for result in results {
            match result {
                Ok(()) => tally.success += 1,
                Err(e) => {
                    warn!(error = %e, "Instance evaluation failed");
                    tally.errors += 1;
                }
            }
        }
        Ok(tally)
    }

    async fn score_instance(
        &self,
        context: &RunContext,
        instance: MonitoredInstance,
    ) -> CollectorResult<()> {
        let measurement =
            match tokio::time::timeout(self.measurement_timeout, context.source.measure(&instance))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(CollectorError::Timeout {
                        server: instance.server.clone(),
                        timeout_ms: self.measurement_timeout.as_millis() as u64,
                    })
                }
            };

        let now = Utc::now();
        let exception = self
            .exceptions
            .active_exception(context.kind, &instance.server, now)
            .await?;
        let mut notes = measurement.notes.clone();

        let (score, fired_rule) = match &exception {
            Some(exception) => {
                notes.push(format!("suppressed by {}", exception.id));
                (MAX_SCORE, None)
            }
            None => {
                let evaluation = evaluate(&measurement, &context.rules, context.baseline);
                if let Some(rule) = &evaluation.fired {
                    notes.push(format!("fired: {}", rule.label()));
                }
                (evaluation.score, evaluation.fired)
            }
        };

        debug!(
            server = %instance.server,
            score,
            suppressed = exception.is_some(),
            "Instance scored"
        );

        self.storage
            .insert_category_score(CategoryScore {
                server: instance.server,
                kind: context.kind,
                run_id: context.run_id,
                score,
                measurement,
                fired_rule,
                suppressed_by_exception: exception.is_some(),
                notes,
                scored_at: now,
            })
            .await?;
        Ok(())
    }

    // Only the last-run fields are written; admin settings stay as stored.
    async fn record_run(
        &self,
        log: &CollectorExecutionLog,
        processed: u32,
        last_error: Option<String>,
    ) -> CollectorResult<()> {
        let recorded = self
            .storage
            .record_collector_run(log.kind, log.started_at, processed, last_error)
            .await?;
        if !recorded {
            warn!(kind = %log.kind, "Collector configuration vanished during the run");
        }
        Ok(())
    }
}
