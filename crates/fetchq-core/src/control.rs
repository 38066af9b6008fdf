//! Run cancellation.
//!
//! A `CancelToken` is handed out by the coordinator before `run()`; any thread
//! (signal handler, UI) can trip it. The scheduling loop checks it on every
//! wake-up and stops dispatching; in-flight attempts run to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            tracing::info!("cancellation requested; no further tasks will be dispatched");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
