//! Collectors: metric sources, exceptions, and the per-run driver

mod exceptions;
mod registry;
mod runner;
mod source;

pub use exceptions::ExceptionRegistry;
pub use registry::SourceRegistry;
pub use runner::CollectorRunner;
pub use source::{InstanceProvider, MetricSource, SimulatedMetricSource, StaticInventory};
