//! Admission control for deployments

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::deploy::resolver::normalize_identifier;

/// Tracks which projects currently have a deployment running
///
/// Identifiers are normalized so `my-app` and `MY_APP` share a slot.
#[derive(Debug, Default)]
pub struct DeployGate {
    in_flight: Mutex<HashSet<String>>,
}

impl DeployGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a project; `None` when it is already being deployed
    pub fn try_acquire(self: &Arc<Self>, project_id: &str) -> Option<GateGuard> {
        let key = normalize_identifier(project_id);
        let mut in_flight = self.in_flight.lock().ok()?;
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(GateGuard {
            gate: Arc::clone(self),
            key,
        })
    }
}

/// Releases the project slot on drop
#[derive(Debug)]
pub struct GateGuard {
    gate: Arc<DeployGate>,
    key: String,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.gate.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}

/// Global cap on concurrently executing deployments
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimit {
    pub fn new(max: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).acquire_owned().await.ok()
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
