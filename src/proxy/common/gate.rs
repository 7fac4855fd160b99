// Serialization gate
// Bounds how many upstream calls may be in flight at once (default: exactly one)

use std::future::Future;
use tokio::sync::Semaphore;

use crate::error::ProxyError;

pub struct SerializationGate {
    permits: Semaphore,
    capacity: usize,
}

impl SerializationGate {
    pub fn new(max_in_flight: usize) -> Self {
        let capacity = max_in_flight.max(1);
        Self {
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Run `call` while holding a permit. The permit is released as soon as
    /// `call` resolves, so callers must keep body streaming outside of it.
    ///
    /// Waiters are not cancelled or timed out: a hung call holds its permit
    /// until it returns.
    pub async fn run<F, T>(&self, call: F) -> Result<T, ProxyError>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProxyError::GateClosed)?;
        Ok(call.await)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for SerializationGate {
    fn default() -> Self {
        Self::new(1)
    }
}
