//! Admission control bounding how many steps execute at once

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("admission cancelled")]
    Cancelled,

    #[error("requested {requested} units from a gate of capacity {capacity}")]
    ExceedsCapacity { requested: usize, capacity: usize },

    #[error("admission gate closed")]
    Closed,
}

/// Counting gate with a fixed capacity
///
/// No priority or fairness beyond the order acquisitions are issued in.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_use: Arc<AtomicUsize>,
}

/// Units held from an [`AdmissionGate`], returned on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    units: usize,
    in_use: Arc<AtomicUsize>,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units currently held
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Wait until `units` are free or `cancel` fires
    ///
    /// A cancelled token wins even when capacity is free, and a cancelled
    /// acquisition holds nothing.
    pub async fn acquire(
        &self,
        units: usize,
        cancel: &CancellationToken,
    ) -> Result<AdmissionPermit, GateError> {
        let exceeds = GateError::ExceedsCapacity {
            requested: units,
            capacity: self.capacity,
        };
        if units > self.capacity {
            return Err(exceeds);
        }
        let count = u32::try_from(units).map_err(|_| exceeds)?;

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GateError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_many_owned(count) => {
                permit.map_err(|_| GateError::Closed)?
            }
        };

        self.in_use.fetch_add(units, Ordering::SeqCst);
        Ok(AdmissionPermit {
            _permit: permit,
            units,
            in_use: Arc::clone(&self.in_use),
        })
    }
}

impl AdmissionPermit {
    pub fn units(&self) -> usize {
        self.units
    }

    /// Return the units to the gate
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        // Count drops before the semaphore hands the units to the next waiter.
        self.in_use.fetch_sub(self.units, Ordering::SeqCst);
    }
}
