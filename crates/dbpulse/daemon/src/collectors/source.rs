//! Instance inventory and metric sources.
//!
//! The engine never talks to database servers itself: it asks an
//! [`InstanceProvider`] which instances exist and a [`MetricSource`] for
//! one measurement per instance.

use async_trait::async_trait;
use dbpulse_scoring::catalog;
use dbpulse_types::{CollectorKind, Measurement, MonitoredInstance};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::config::InventoryConfig;
use crate::error::{CollectorError, CollectorResult};

/// Source of the monitored instance list.
#[async_trait]
pub trait InstanceProvider: Send + Sync {
    /// All known instances, enabled or not.
    async fn list_instances(&self) -> CollectorResult<Vec<MonitoredInstance>>;
}

/// Produces one measurement of one collector kind for one instance.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Collector kind this source measures.
    fn kind(&self) -> CollectorKind;

    /// Take a measurement of `instance`.
    async fn measure(&self, instance: &MonitoredInstance) -> CollectorResult<Measurement>;
}

/// Inventory backed by the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    instances: Vec<MonitoredInstance>,
}

impl StaticInventory {
    pub fn new(instances: Vec<MonitoredInstance>) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl InstanceProvider for StaticInventory {
    async fn list_instances(&self) -> CollectorResult<Vec<MonitoredInstance>> {
        Ok(self.instances.clone())
    }
}

/// Metric source that samples readings around the catalog's nominal and
/// degraded values.
///
/// Stands in for a real DMV-querying source in development.
#[derive(Debug, Clone)]
pub struct SimulatedMetricSource {
    kind: CollectorKind,
    degraded_ratio: f64,
    failure_ratio: f64,
}

impl SimulatedMetricSource {
    pub fn new(kind: CollectorKind, degraded_ratio: f64, failure_ratio: f64) -> Self {
        Self {
            kind,
            degraded_ratio: sanitize_ratio(degraded_ratio),
            failure_ratio: sanitize_ratio(failure_ratio),
        }
    }

    /// Create a source using the inventory's sampling ratios.
    pub fn from_config(kind: CollectorKind, config: &InventoryConfig) -> Self {
        Self::new(kind, config.degraded_ratio, config.failure_ratio)
    }

    fn sample(&self, rng: &mut impl Rng) -> Measurement {
        let definition = catalog::definition(self.kind);
        let mut measurement = Measurement::new();

        for group in definition.groups {
            let value = if rng.gen_bool(self.degraded_ratio) {
                let severity = rng.gen_range(0.6..=1.0);
                group.nominal + (group.degraded - group.nominal) * severity
            } else {
                let jitter = rng.gen_range(-0.2..=0.2);
                group.nominal * (1.0 + jitter)
            };
            measurement = measurement.with_reading(group.name, round2(value.max(0.0)));
        }

        measurement
    }
}

#[async_trait]
impl MetricSource for SimulatedMetricSource {
    fn kind(&self) -> CollectorKind {
        self.kind
    }

    async fn measure(&self, instance: &MonitoredInstance) -> CollectorResult<Measurement> {
        let mut rng = StdRng::from_entropy();

        if rng.gen_bool(self.failure_ratio) {
            return Err(CollectorError::Measurement {
                server: instance.server.clone(),
                reason: format!("{}:{} did not respond", instance.host, instance.port),
            });
        }

        let measurement = self.sample(&mut rng);
        debug!(
            kind = %self.kind,
            server = %instance.server,
            readings = measurement.readings.len(),
            "Simulated measurement"
        );
        Ok(measurement)
    }
}

fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_inventory_lists_configured_instances() {
        let inventory = StaticInventory::new(vec![
            MonitoredInstance::new("SQL01", "sql01.local"),
            MonitoredInstance::new("SQL02", "sql02.local"),
        ]);
        assert_eq!(inventory.list_instances().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_nominal_source_reads_every_group() {
        let source = SimulatedMetricSource::new(CollectorKind::Backups, 0.0, 0.0);
        let instance = MonitoredInstance::new("SQL01", "sql01.local");

        let measurement = source.measure(&instance).await.unwrap();
        let full = measurement.reading("HoursSinceFullBackup").unwrap();
        assert!((9.6..=14.4).contains(&full));
        assert!(measurement.reading("HoursSinceLogBackup").is_some());
    }

    #[tokio::test]
    async fn test_always_failing_source() {
        let source = SimulatedMetricSource::new(CollectorKind::Cpu, 0.0, 1.0);
        let instance = MonitoredInstance::new("SQL01", "sql01.local");

        let err = source.measure(&instance).await.unwrap_err();
        assert!(matches!(err, CollectorError::Measurement { .. }));
    }

    #[test]
    fn test_degraded_sample_moves_towards_degraded_value() {
        let source = SimulatedMetricSource::new(CollectorKind::Cpu, 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(7);

        let measurement = source.sample(&mut rng);
        assert!(measurement.reading("Utilization").unwrap() >= 74.0);
    }

    #[test]
    fn test_ratio_is_clamped() {
        let source = SimulatedMetricSource::new(CollectorKind::Cpu, 3.0, f64::NAN);
        assert_eq!(source.degraded_ratio, 1.0);
        assert_eq!(source.failure_ratio, 0.0);
    }
}
