pub mod config;
pub mod logging;

pub mod control;
pub mod error;
pub mod event;
pub mod history;
pub mod probe;
pub mod queue;
pub mod resume;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod worker;

pub use config::EngineConfig;
pub use control::CancelToken;
pub use error::EngineError;
pub use event::{EngineEvent, ProgressSample};
pub use scheduler::{Coordinator, EngineStatistics, RunSummary};
pub use task::{DownloadTask, TaskSpec, TaskStatus};
