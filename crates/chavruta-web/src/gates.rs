//! Fetch concurrency gates: one global semaphore, one per host
//!
//! Permits are acquired global-first and released by drop, so every
//! exit path — success, policy rejection, timeout — restores both
//! counters.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::WebError;

pub struct FetchGates {
    global: Arc<Semaphore>,
    per_host: DashMap<String, Arc<Semaphore>>,
    per_host_limit: usize,
}

/// Both permits for one in-flight fetch
pub struct GatePermit {
    _global: OwnedSemaphorePermit,
    _host: OwnedSemaphorePermit,
}

impl FetchGates {
    pub fn new(global_limit: usize, per_host_limit: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_limit.max(1))),
            per_host: DashMap::new(),
            per_host_limit: per_host_limit.max(1),
        }
    }

    /// Wait for a global slot, then a slot for `host` (FIFO each)
    pub async fn acquire(&self, host: &str) -> Result<GatePermit, WebError> {
        let global = Arc::clone(&self.global)
            .acquire_owned()
            .await
            .map_err(|_| WebError::Request("fetch gate closed".to_owned()))?;

        let host_semaphore = Arc::clone(
            &self
                .per_host
                .entry(host.to_lowercase())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit))),
        );
        let host = host_semaphore
            .acquire_owned()
            .await
            .map_err(|_| WebError::Request("fetch gate closed".to_owned()))?;

        Ok(GatePermit {
            _global: global,
            _host: host,
        })
    }

    /// Available global permits (for tests and diagnostics)
    pub fn global_available(&self) -> usize {
        self.global.available_permits()
    }

    /// Available permits for one host
    pub fn host_available(&self, host: &str) -> Option<usize> {
        self.per_host.get(&host.to_lowercase()).map(|s| s.available_permits())
    }
}
