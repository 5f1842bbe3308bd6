//! Concurrency gate bounding simultaneous branch work.
//!
//! One gate instance spans the *entire* resolution call tree, bounding the
//! number of outbound lookups against the shared metadata service no matter
//! how deep or wide the rule graph gets. The permit covers a branch's own
//! unit of work and is released (by scope, including on error paths) before
//! the branch descends into its children, so recursion depth cannot starve
//! the gate.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ResolveError;

/// Default number of branch units admitted concurrently.
pub const DEFAULT_GATE_LIMIT: usize = 20;

/// Shared admission limiter for branch resolution work.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `limit` concurrent units.
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Wait for admission. The returned permit releases its slot when
    /// dropped.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, ResolveError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ResolveError::Lookup("concurrency gate closed".into()))
    }

    /// Number of currently free slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admission_is_bounded() {
        let gate = ConcurrencyGate::new(2);
        let first = gate.admit().await.unwrap();
        let _second = gate.admit().await.unwrap();
        assert_eq!(gate.available(), 0);

        drop(first);
        assert_eq!(gate.available(), 1);
        let _third = gate.admit().await.unwrap();
        assert_eq!(gate.available(), 0);
    }

    #[tokio::test]
    async fn test_permit_released_on_error_path() {
        let gate = ConcurrencyGate::new(1);
        let failing = async {
            let _permit = gate.admit().await?;
            Err::<(), _>(ResolveError::lookup("boom"))
        };
        assert!(failing.await.is_err());
        assert_eq!(gate.available(), 1);
    }
}
