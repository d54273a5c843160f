//! Inference concurrency gate
//!
//! Bounds how many inference calls may execute against one model instance
//! at a time. A single counting semaphore is the sole source of truth: the
//! in-flight counter is derived from it, so the two can never drift apart
//! and the counter can never go negative.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Bounded permit pool of fixed size. tokio's semaphore is FIFO-fair, so
/// waiters are released in arrival order and none starve.
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Acquire one permit, suspending the caller until one is available.
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Runtime("concurrency gate closed".to_string()))?;
        Ok(GatePermit { _permit: permit })
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// One unit of gate capacity, held for the duration of one inference call.
/// Dropping it releases the permit.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}
