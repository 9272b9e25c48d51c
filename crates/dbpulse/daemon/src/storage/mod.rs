//! Storage layer for dbpulse-daemon
//!
//! Persists collector configuration, rules, exceptions, run logs, scores and
//! transitions.

mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::{
    CollectorConfigStorage, ExceptionStorage, ExecutionLogStorage, RuleStorage, ScoreStorage,
    Storage, StorageResult, TransitionStorage,
};
