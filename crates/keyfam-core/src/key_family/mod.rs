//! Key family model
//!
//! A `KeyFamily` is the verified, read-only form of a `KeyFamilySnapshot`.
//! Construction checks the whole signature chain; once built, a family is
//! never mutated. Provisioning submits a new entry to the store and the
//! family is reloaded afterwards.
//!
//! Chain rules:
//! 1. An empty snapshot is a family with no eldest key.
//! 2. The first entry is a self-signed eldest key.
//! 3. There is exactly one eldest key.
//! 4. Every later entry is signed by an earlier eldest or sibkey entry.
//! 5. Sibkeys carry a valid reverse signature.
//! 6. Key ids are unique.
//! 7. A device holds at most one active signing key.
//!
//! Revoked entries remain valid links; they only drop out of the computed view.

mod computed;
mod entry;

pub use computed::ComputedKeyFamily;
pub use entry::{BindingStatement, KeyEntry, KeyFamilySnapshot, KeyKind, KeyRole, BINDING_DOMAIN};

use crate::effects::KeyFamilyStore;
use crate::types::{DeviceId, DeviceIdentity, Identity, KeyId};
use crate::{KeyfamError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Verified key family of one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFamily {
    identity: Identity,
    entries: Vec<KeyEntry>,
}

impl KeyFamily {
    /// Verify a snapshot's signature chain
    pub fn from_snapshot(snapshot: KeyFamilySnapshot) -> Result<Self> {
        let KeyFamilySnapshot { identity, entries } = snapshot;
        verify_chain(&identity, &entries)?;
        Ok(Self { identity, entries })
    }

    /// Owner of the family
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// All entries in registration order, revoked ones included
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Root of trust, absent if the user never registered a key
    pub fn eldest(&self) -> Option<&KeyEntry> {
        self.entries.first()
    }

    /// Identifier of the eldest key
    pub fn eldest_id(&self) -> Option<KeyId> {
        self.eldest().map(KeyEntry::key_id)
    }

    /// Look up an entry by key id
    pub fn entry(&self, key_id: &KeyId) -> Option<&KeyEntry> {
        self.entries.iter().find(|entry| entry.key_id() == *key_id)
    }

    /// Derived view of the active keys; `None` exactly when there is no eldest key
    pub fn computed(&self) -> Option<ComputedKeyFamily<'_>> {
        ComputedKeyFamily::derive(self)
    }
}

/// Free-function form of [`KeyFamily::computed`]
pub fn computed(family: &KeyFamily) -> Option<ComputedKeyFamily<'_>> {
    family.computed()
}

/// Whether the device holds an active sibkey in the computed view
pub fn has_active_key_for_device(computed: &ComputedKeyFamily<'_>, device: &DeviceIdentity) -> bool {
    computed.device_sibkey(device.id()).is_some()
}

/// Load and verify an identity's key family from the store
///
/// Fails with `NotFound` if the store does not know the identity and with
/// `Integrity` if the chain is broken or the snapshot belongs to someone else.
pub async fn load(store: &dyn KeyFamilyStore, identity: &Identity) -> Result<Arc<KeyFamily>> {
    let snapshot = store.load(identity).await?;
    if snapshot.identity.user_id != identity.user_id {
        return Err(KeyfamError::integrity(format!(
            "store returned keys of {} for {}",
            snapshot.identity.user_id, identity.user_id
        )));
    }

    let family = KeyFamily::from_snapshot(snapshot)?;
    tracing::debug!(
        user = %identity.username,
        entries = family.entries().len(),
        eldest = ?family.eldest_id(),
        "Loaded key family"
    );
    Ok(Arc::new(family))
}

fn verify_chain(identity: &Identity, entries: &[KeyEntry]) -> Result<()> {
    let Some(eldest) = entries.first() else {
        return Ok(());
    };

    if eldest.role != KeyRole::Eldest {
        return Err(KeyfamError::integrity(format!(
            "first entry is a {} rather than the eldest key",
            eldest.role
        )));
    }
    let eldest_id = eldest.key_id();
    if eldest.signer != eldest_id {
        return Err(KeyfamError::integrity("eldest key is not self-signed"));
    }

    let mut valid: HashMap<KeyId, &KeyEntry> = HashMap::with_capacity(entries.len());
    let mut device_keys: HashMap<DeviceId, KeyId> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        let key_id = entry.key_id();
        if valid.contains_key(&key_id) {
            return Err(KeyfamError::integrity(format!(
                "key {} registered twice",
                key_id.short()
            )));
        }
        if index > 0 && entry.role == KeyRole::Eldest {
            return Err(KeyfamError::integrity(format!(
                "second eldest key {} at position {index}",
                key_id.short()
            )));
        }

        let signer = if index == 0 {
            entry
        } else {
            let signer = valid.get(&entry.signer).ok_or_else(|| {
                KeyfamError::integrity(format!(
                    "key {} signed by unknown key {}",
                    key_id.short(),
                    entry.signer.short()
                ))
            })?;
            if !signer.role.can_sign() {
                return Err(KeyfamError::integrity(format!(
                    "key {} signed by {} {}",
                    key_id.short(),
                    signer.role,
                    entry.signer.short()
                )));
            }
            *signer
        };

        let message = entry.statement(identity, eldest_id).to_bytes()?;
        signer
            .public_key
            .verify_strict(&message, &entry.signature)
            .map_err(|_| {
                KeyfamError::integrity(format!("bad binding signature on key {}", key_id.short()))
            })?;

        if entry.role == KeyRole::Sibkey {
            let reverse = entry.reverse_signature.as_ref().ok_or_else(|| {
                KeyfamError::integrity(format!("sibkey {} lacks reverse signature", key_id.short()))
            })?;
            entry
                .public_key
                .verify_strict(&message, reverse)
                .map_err(|_| {
                    KeyfamError::integrity(format!(
                        "bad reverse signature on sibkey {}",
                        key_id.short()
                    ))
                })?;
        }

        if let Some(device_id) = entry.device_id().filter(|_| entry.is_active()) {
            if let Some(existing) = device_keys.insert(device_id, key_id) {
                return Err(KeyfamError::integrity(format!(
                    "device {device_id} has active keys {} and {}",
                    existing.short(),
                    key_id.short()
                )));
            }
        }

        valid.insert(key_id, entry);
    }

    Ok(())
}
