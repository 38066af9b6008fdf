//! Tasks currently held by workers.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::EngineError;
use crate::event::WorkerId;

/// Bookkeeping for one executing attempt.
#[derive(Debug, Clone)]
pub struct WorkerSlot {
    pub worker: WorkerId,
    pub task_id: String,
    pub destination: PathBuf,
    /// Attempt number this slot was dispatched for.
    pub attempt: u32,
    pub started_at: SystemTime,
    /// Bytes already credited to statistics through progress samples.
    pub reported_bytes: u64,
}

/// Active set: at most `limit` slots, one per destination.
#[derive(Debug)]
pub struct ActiveSet {
    limit: usize,
    slots: HashMap<WorkerId, WorkerSlot>,
    destinations: HashSet<PathBuf>,
}

impl ActiveSet {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            slots: HashMap::with_capacity(limit),
            destinations: HashSet::with_capacity(limit),
        }
    }

    /// Register a dispatched attempt. Fails without changing the set if the
    /// limit would be exceeded or the destination is already owned.
    pub fn insert(&mut self, slot: WorkerSlot) -> Result<(), EngineError> {
        if self.slots.len() >= self.limit {
            return Err(EngineError::ConcurrencyLimitViolation {
                active: self.slots.len() + 1,
                limit: self.limit,
            });
        }
        if self.destinations.contains(&slot.destination) || self.slots.contains_key(&slot.worker) {
            return Err(EngineError::DestinationInUse {
                path: slot.destination,
            });
        }
        self.destinations.insert(slot.destination.clone());
        self.slots.insert(slot.worker, slot);
        Ok(())
    }

    pub fn remove(&mut self, worker: WorkerId) -> Option<WorkerSlot> {
        let slot = self.slots.remove(&worker)?;
        self.destinations.remove(&slot.destination);
        Some(slot)
    }

    pub fn get_mut(&mut self, worker: WorkerId) -> Option<&mut WorkerSlot> {
        self.slots.get_mut(&worker)
    }

    pub fn owns(&self, destination: &Path) -> bool {
        self.destinations.contains(destination)
    }

    pub fn has_capacity(&self) -> bool {
        self.slots.len() < self.limit
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
