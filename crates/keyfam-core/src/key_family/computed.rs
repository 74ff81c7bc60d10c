//! Computed view over a key family

use super::{KeyEntry, KeyFamily, KeyKind, KeyRole};
use crate::types::DeviceId;
use std::collections::BTreeMap;

/// Active (non-revoked) keys of a family, partitioned by device
///
/// Borrows the family it was derived from, so it cannot be cached past the
/// snapshot's lifetime.
#[derive(Debug, Clone)]
pub struct ComputedKeyFamily<'a> {
    active: Vec<&'a KeyEntry>,
    device_sibkeys: BTreeMap<DeviceId, &'a KeyEntry>,
}

impl<'a> ComputedKeyFamily<'a> {
    pub(crate) fn derive(family: &'a KeyFamily) -> Option<Self> {
        family.eldest()?;

        let active: Vec<&KeyEntry> = family.entries().iter().filter(|e| e.is_active()).collect();

        // Chain verification leaves at most one active signing key per device.
        let mut device_sibkeys = BTreeMap::new();
        for entry in &active {
            if !entry.role.can_sign() {
                continue;
            }
            if let Some(device_id) = entry.device_id() {
                device_sibkeys.insert(device_id, *entry);
            }
        }

        Some(Self {
            active,
            device_sibkeys,
        })
    }

    /// Whether any key is still active
    pub fn has_active_key(&self) -> bool {
        !self.active.is_empty()
    }

    /// Active signing key of a device
    pub fn device_sibkey(&self, device_id: DeviceId) -> Option<&'a KeyEntry> {
        self.device_sibkeys.get(&device_id).copied()
    }

    /// Devices with an active signing key, with that key
    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &'a KeyEntry)> + '_ {
        self.device_sibkeys.iter().map(|(id, entry)| (*id, *entry))
    }

    /// Active PGP keys that may sign
    pub fn active_pgp_keys(&self) -> Vec<&'a KeyEntry> {
        self.signing_keys()
            .filter(|entry| entry.kind.is_pgp())
            .collect()
    }

    /// Active passphrase-derived keys that may sign
    pub fn active_passphrase_keys(&self) -> Vec<&'a KeyEntry> {
        self.signing_keys()
            .filter(|entry| matches!(entry.kind, KeyKind::Passphrase))
            .collect()
    }

    /// Whether the eldest key itself is still active
    pub fn eldest_active(&self) -> bool {
        self.active.iter().any(|entry| entry.role == KeyRole::Eldest)
    }

    fn signing_keys(&self) -> impl Iterator<Item = &'a KeyEntry> + '_ {
        self.active.iter().copied().filter(|entry| entry.role.can_sign())
    }
}
