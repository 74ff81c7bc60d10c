//! In-flight provisioning registry
//!
//! At most one provisioning attempt may run per identity and device. The slot
//! is held by an RAII guard and released on every exit path.

use keyfam_core::{DeviceId, Identity, KeyfamError, Result, UserId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

type Slot = (UserId, DeviceId);

/// Shared set of identity+device pairs with an attempt in flight
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    active: Arc<Mutex<HashSet<Slot>>>,
}

impl InFlightRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `identity` on `device`
    ///
    /// Fails with `AlreadyInProgress` if another attempt holds it.
    pub fn try_acquire(&self, identity: &Identity, device: DeviceId) -> Result<InFlightGuard> {
        let slot = (identity.user_id, device);
        if !self.active.lock().insert(slot) {
            return Err(KeyfamError::AlreadyInProgress {
                user: identity.username.clone(),
                device: device.to_string(),
            });
        }
        Ok(InFlightGuard {
            active: Arc::clone(&self.active),
            slot,
        })
    }

    /// Whether an attempt is in flight for the pair
    pub fn is_active(&self, user: UserId, device: DeviceId) -> bool {
        self.active.lock().contains(&(user, device))
    }

    /// Number of attempts in flight
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// Whether no attempt is in flight
    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

/// Releases its slot when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Slot>>>,
    slot: Slot,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_second_acquire_conflicts_until_release() {
        let registry = InFlightRegistry::new();
        let identity = Identity::new(UserId::new(), "quinn");
        let device = DeviceId::new();

        let guard = registry.try_acquire(&identity, device).unwrap();
        assert!(registry.is_active(identity.user_id, device));
        assert_matches!(
            registry.try_acquire(&identity, device),
            Err(KeyfamError::AlreadyInProgress { .. })
        );

        drop(guard);
        assert!(registry.is_empty());
        assert!(registry.try_acquire(&identity, device).is_ok());
    }

    #[test]
    fn test_slots_are_per_device() {
        let registry = InFlightRegistry::new();
        let identity = Identity::new(UserId::new(), "quinn");

        let _a = registry.try_acquire(&identity, DeviceId::new()).unwrap();
        let _b = registry.try_acquire(&identity, DeviceId::new()).unwrap();
        assert_eq!(registry.len(), 2);
    }
}
