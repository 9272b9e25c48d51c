//! Collector timers and the consolidation loop

mod consolidator;
mod orchestrator;

pub use consolidator::HealthConsolidator;
pub use orchestrator::CollectorOrchestrator;
