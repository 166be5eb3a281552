//! Signing-window leases
//!
//! A registry must hold its window from the moment its batch is built until
//! its reply is merged. Leases are owned guards, so a handler that errors,
//! times out or is cancelled releases the window by dropping.

use cosign_core::{CosignError, RegistryId, Result, WindowPolicy};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const EXCLUSIVE_SLOT: &str = "*";

/// Held signing window; released on drop
#[derive(Debug)]
pub struct WindowLease {
    registry: RegistryId,
    _guard: OwnedMutexGuard<()>,
}

impl WindowLease {
    /// Registry the lease was granted to
    pub fn registry(&self) -> &RegistryId {
        &self.registry
    }
}

impl Drop for WindowLease {
    fn drop(&mut self) {
        tracing::trace!(registry = %self.registry, "signing window released");
    }
}

/// Window slots keyed per [`WindowPolicy`]
#[derive(Debug, Default)]
pub struct SigningWindows {
    policy: WindowPolicy,
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SigningWindows {
    /// Create with the given policy
    pub fn new(policy: WindowPolicy) -> Self {
        Self {
            policy,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Active policy
    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    fn slot(&self, registry: &RegistryId) -> Arc<AsyncMutex<()>> {
        let key = match self.policy {
            WindowPolicy::PerRegistry => registry.as_str(),
            WindowPolicy::Exclusive => EXCLUSIVE_SLOT,
        };
        self.slots
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Wait up to `wait` for `registry`'s window
    pub async fn acquire(&self, registry: &RegistryId, wait: Duration) -> Result<WindowLease> {
        let slot = self.slot(registry);
        match tokio::time::timeout(wait, slot.lock_owned()).await {
            Ok(guard) => {
                tracing::trace!(%registry, "signing window acquired");
                Ok(WindowLease {
                    registry: registry.clone(),
                    _guard: guard,
                })
            }
            Err(_) => Err(CosignError::window_busy(registry.as_str())),
        }
    }

    /// Whether `registry`'s window is currently held
    pub fn is_held(&self, registry: &RegistryId) -> bool {
        self.slot(registry).try_lock().is_err()
    }
}
