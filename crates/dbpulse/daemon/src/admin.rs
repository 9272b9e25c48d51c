//! Configuration surface shared by the REST API and the daemon bootstrap.
//!
//! Every write is validated before it reaches the store; rejected input never
//! changes state.

use std::sync::Arc;

use dbpulse_scoring::{
    catalog, check_weights, validate_collector_config, validate_rules, ConsolidationReport,
    WeightReport,
};
use dbpulse_types::{
    CollectorConfig, CollectorConfigUpdate, CollectorException, CollectorExecutionLog,
    CollectorKind, ExceptionId, NewException, RunId, ThresholdRule,
};
use tracing::{info, instrument, warn};

use crate::collectors::ExceptionRegistry;
use crate::error::{AdminError, AdminResult};
use crate::scheduler::{CollectorOrchestrator, HealthConsolidator};
use crate::storage::Storage;

/// Result of a collector configuration update.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CollectorUpdate {
    pub config: CollectorConfig,
    pub weights: WeightReport,
}

/// Validated configuration and control operations.
#[derive(Clone)]
pub struct AdminService {
    storage: Arc<dyn Storage>,
    exceptions: ExceptionRegistry,
    orchestrator: Arc<CollectorOrchestrator>,
    consolidator: Arc<HealthConsolidator>,
}

impl AdminService {
    pub fn new(
        storage: Arc<dyn Storage>,
        orchestrator: Arc<CollectorOrchestrator>,
        consolidator: Arc<HealthConsolidator>,
    ) -> Self {
        Self {
            exceptions: ExceptionRegistry::new(storage.clone()),
            storage,
            orchestrator,
            consolidator,
        }
    }

    /// Seed configuration and rules for collectors that have none.
    ///
    /// Existing rows are left untouched. Returns the number of kinds seeded.
    #[instrument(skip(self))]
    pub async fn ensure_defaults(&self) -> AdminResult<usize> {
        let mut seeded = 0;
        for definition in catalog::all_definitions() {
            if self
                .storage
                .get_collector_config(definition.kind)
                .await?
                .is_none()
            {
                self.storage
                    .upsert_collector_config(definition.default_config())
                    .await?;
                seeded += 1;
            }
            if self.storage.get_rules(definition.kind).await?.is_none() {
                self.storage
                    .replace_rules(definition.kind, catalog::default_rules(definition.kind))
                    .await?;
            }
        }

        if seeded > 0 {
            info!(seeded, "Seeded default collector configuration");
        }
        Ok(seeded)
    }

    pub async fn list_collectors(&self) -> AdminResult<Vec<CollectorConfig>> {
        Ok(self.storage.list_collector_configs().await?)
    }

    pub async fn get_collector(&self, kind: CollectorKind) -> AdminResult<CollectorConfig> {
        self.storage
            .get_collector_config(kind)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("collector {}", kind)))
    }

    /// Apply a partial update to one collector.
    ///
    /// Enabling a collector starts its timer; disabling stops it at the next
    /// tick.
    #[instrument(skip(self, update))]
    pub async fn update_collector(
        &self,
        kind: CollectorKind,
        update: CollectorConfigUpdate,
    ) -> AdminResult<CollectorUpdate> {
        let current = self.get_collector(kind).await?;
        let updated = update.apply_to(&current);
        validate_collector_config(&updated)?;

        let updated = self
            .storage
            .update_collector_settings(updated)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("collector {}", kind)))?;
        info!(
            kind = %kind,
            enabled = updated.enabled,
            interval_secs = updated.interval_secs,
            weight = updated.weight,
            "Collector configuration updated"
        );

        if updated.enabled && !current.enabled {
            self.orchestrator.refresh().await?;
        }

        let weights = self.weight_report().await?;
        Ok(CollectorUpdate {
            config: updated,
            weights,
        })
    }

    /// Total of enabled weights, with a warning when it is not 100.
    pub async fn weight_report(&self) -> AdminResult<WeightReport> {
        let configs = self.storage.list_collector_configs().await?;
        Ok(check_weights(&configs))
    }

    /// Current rules of a collector, shipped defaults when none are stored.
    pub async fn get_rules(&self, kind: CollectorKind) -> AdminResult<Vec<ThresholdRule>> {
        Ok(self
            .storage
            .get_rules(kind)
            .await?
            .unwrap_or_else(|| catalog::default_rules(kind)))
    }

    /// Replace the whole rule set of a collector.
    #[instrument(skip(self, rules), fields(rules = rules.len()))]
    pub async fn replace_rules(
        &self,
        kind: CollectorKind,
        rules: Vec<ThresholdRule>,
    ) -> AdminResult<Vec<ThresholdRule>> {
        validate_rules(kind, &rules)?;
        self.storage.replace_rules(kind, rules.clone()).await?;
        info!(kind = %kind, rules = rules.len(), "Threshold rules replaced");
        Ok(rules)
    }

    /// Restore the shipped rule set of a collector.
    pub async fn reset_rules(&self, kind: CollectorKind) -> AdminResult<Vec<ThresholdRule>> {
        let rules = catalog::default_rules(kind);
        self.storage.replace_rules(kind, rules.clone()).await?;
        warn!(kind = %kind, "Threshold rules reset to defaults");
        Ok(rules)
    }

    pub async fn list_exceptions(
        &self,
        kind: CollectorKind,
    ) -> AdminResult<Vec<CollectorException>> {
        Ok(self.exceptions.list(kind).await?)
    }

    pub async fn add_exception(
        &self,
        kind: CollectorKind,
        request: NewException,
    ) -> AdminResult<CollectorException> {
        self.exceptions.add(kind, request).await
    }

    pub async fn remove_exception(&self, id: &ExceptionId) -> AdminResult<()> {
        if self.exceptions.remove(id).await? {
            Ok(())
        } else {
            Err(AdminError::NotFound(format!("exception {}", id)))
        }
    }

    pub fn exception_kinds(&self, kind: CollectorKind) -> Vec<&'static str> {
        ExceptionRegistry::supported_exception_kinds(kind)
    }

    /// Manual run, rejected while a run of the same kind is in flight.
    pub async fn trigger(&self, kind: CollectorKind) -> AdminResult<RunId> {
        Ok(self.orchestrator.trigger_now(kind).await?)
    }

    pub fn is_running(&self, kind: CollectorKind) -> bool {
        self.orchestrator.is_running(kind)
    }

    pub fn running_kinds(&self) -> Vec<CollectorKind> {
        self.orchestrator.running_kinds()
    }

    pub async fn executions(
        &self,
        kind: CollectorKind,
        limit: usize,
    ) -> AdminResult<Vec<CollectorExecutionLog>> {
        Ok(self.storage.list_execution_logs(kind, limit).await?)
    }

    /// Out-of-band consolidation cycle.
    pub async fn run_consolidation(&self) -> AdminResult<ConsolidationReport> {
        Ok(self.consolidator.run_now().await?)
    }
}
