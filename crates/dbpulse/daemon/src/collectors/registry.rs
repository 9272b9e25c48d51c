//! Collector kind to metric source mapping.

use std::collections::HashMap;
use std::sync::Arc;

use dbpulse_types::CollectorKind;

use super::source::{MetricSource, SimulatedMetricSource};
use crate::config::InventoryConfig;

/// Registered metric sources, at most one per collector kind.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<CollectorKind, Arc<dyn MetricSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a simulated source for every collector kind.
    pub fn simulated(config: &InventoryConfig) -> Self {
        let mut registry = Self::new();
        for kind in CollectorKind::ALL {
            registry.register(Arc::new(SimulatedMetricSource::from_config(kind, config)));
        }
        registry
    }

    /// Register a source under its own kind, replacing any previous one.
    pub fn register(&mut self, source: Arc<dyn MetricSource>) {
        self.sources.insert(source.kind(), source);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, kind: CollectorKind) -> Option<Arc<dyn MetricSource>> {
        self.sources.get(&kind).cloned()
    }

    /// Registered kinds in declared order.
    pub fn kinds(&self) -> Vec<CollectorKind> {
        CollectorKind::ALL
            .into_iter()
            .filter(|kind| self.sources.contains_key(kind))
            .collect()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_registry_covers_every_kind() {
        let registry = SourceRegistry::simulated(&InventoryConfig::default());
        assert_eq!(registry.kinds().len(), CollectorKind::ALL.len());
        assert_eq!(
            registry.get(CollectorKind::WaitStats).unwrap().kind(),
            CollectorKind::WaitStats
        );
    }

    #[test]
    fn test_register_replaces_existing_source() {
        let registry = SourceRegistry::new()
            .with_source(Arc::new(SimulatedMetricSource::new(CollectorKind::Cpu, 0.0, 0.0)))
            .with_source(Arc::new(SimulatedMetricSource::new(CollectorKind::Cpu, 1.0, 0.0)));
        assert_eq!(registry.kinds(), vec![CollectorKind::Cpu]);
        assert!(registry.get(CollectorKind::Io).is_none());
    }
}
