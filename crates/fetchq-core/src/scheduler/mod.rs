//! Dispatch loop, active-set bookkeeping and run statistics.
//!
//! One `Coordinator` per run owns the queue and the active set; workers
//! talk to it only through messages.

mod active;
mod coordinator;
mod stats;
mod summary;

pub use active::{ActiveSet, WorkerSlot};
pub use coordinator::Coordinator;
pub use stats::{EngineStatistics, StatisticsAggregator, StatsEvent};
pub use summary::RunSummary;
