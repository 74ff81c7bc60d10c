//! Builder for signed key families
//!
//! Every entry is signed exactly as the provisioning engine would sign it, so
//! built families pass chain verification. Private keys are retained so tests
//! can hand them to secret providers and key-exchange peers.

use ed25519_dalek::{Signer, SigningKey};
use keyfam_core::{
    BindingStatement, DeviceIdentity, Identity, KeyEntry, KeyFamily, KeyFamilySnapshot, KeyId,
    KeyKind, KeyRole,
};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::HashMap;

/// Builds a verified key family one entry at a time
#[derive(Debug, Clone)]
pub struct FamilyBuilder {
    identity: Identity,
    entries: Vec<KeyEntry>,
    secrets: HashMap<KeyId, SigningKey>,
    rng: ChaCha20Rng,
}

impl FamilyBuilder {
    /// Start an empty family for a new identity
    pub fn new(username: &str) -> Self {
        Self::for_identity(crate::identity(username))
    }

    /// Start an empty family for an existing identity
    pub fn for_identity(identity: Identity) -> Self {
        let seed = identity.user_id.uuid().as_u128() as u64;
        Self {
            identity,
            entries: Vec::new(),
            secrets: HashMap::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Owner of the family
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Add a passphrase-derived eldest key
    pub fn with_passphrase_eldest(mut self) -> Self {
        self.push_eldest(KeyKind::Passphrase, false);
        self
    }

    /// Add a PGP eldest key
    pub fn with_pgp_eldest(mut self, fingerprint: &str, synced: bool) -> Self {
        self.push_eldest(
            KeyKind::Pgp {
                fingerprint: fingerprint.to_string(),
            },
            synced,
        );
        self
    }

    /// Add a device eldest key
    pub fn with_device_eldest(mut self, device: &DeviceIdentity) -> Self {
        self.push_eldest(device_kind(device), false);
        self
    }

    /// Add a device sibkey signed by the eldest key
    pub fn add_device(&mut self, device: &DeviceIdentity) -> KeyId {
        self.add_sibkey(device_kind(device), false)
    }

    /// Add a PGP sibkey signed by the eldest key
    pub fn add_pgp(&mut self, fingerprint: &str, synced: bool) -> KeyId {
        self.add_sibkey(
            KeyKind::Pgp {
                fingerprint: fingerprint.to_string(),
            },
            synced,
        )
    }

    /// Add a sibkey of any kind signed by the eldest key
    pub fn add_sibkey(&mut self, kind: KeyKind, synced: bool) -> KeyId {
        let eldest = self.eldest_id().expect("add an eldest key first");
        let signer = self.secrets[&eldest].clone();
        let key = self.next_key();

        let statement = BindingStatement::new(
            &self.identity,
            KeyRole::Sibkey,
            kind.clone(),
            &key.verifying_key(),
            eldest,
            eldest,
        );
        let bytes = statement.to_bytes().unwrap();
        self.push(KeyEntry {
            public_key: key.verifying_key(),
            role: KeyRole::Sibkey,
            kind,
            signer: eldest,
            signature: signer.sign(&bytes),
            reverse_signature: Some(key.sign(&bytes)),
            revoked: false,
            synced_secret: synced,
        }, key)
    }

    /// Mark a key revoked
    pub fn revoke(&mut self, key_id: KeyId) {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.key_id() == key_id)
            .expect("revoking an unknown key");
        entry.revoked = true;
    }

    /// Private half of a key in the family
    pub fn secret(&self, key_id: &KeyId) -> Option<SigningKey> {
        self.secrets.get(key_id).cloned()
    }

    /// Eldest key, if any
    pub fn eldest_id(&self) -> Option<KeyId> {
        self.entries.first().map(KeyEntry::key_id)
    }

    /// Entries added so far
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Unverified snapshot, as a store would return it
    pub fn snapshot(&self) -> KeyFamilySnapshot {
        KeyFamilySnapshot {
            identity: self.identity.clone(),
            entries: self.entries.clone(),
        }
    }

    /// Verified family
    pub fn build(&self) -> KeyFamily {
        KeyFamily::from_snapshot(self.snapshot()).expect("builder produced an invalid chain")
    }

    fn push_eldest(&mut self, kind: KeyKind, synced: bool) -> KeyId {
        assert!(self.entries.is_empty(), "family already has an eldest key");
        let key = self.next_key();
        let statement = BindingStatement::eldest(&self.identity, kind.clone(), &key.verifying_key());
        let signature = key.sign(&statement.to_bytes().unwrap());
        self.push(
            KeyEntry {
                public_key: key.verifying_key(),
                role: KeyRole::Eldest,
                kind,
                signer: statement.signer,
                signature,
                reverse_signature: None,
                revoked: false,
                synced_secret: synced,
            },
            key,
        )
    }

    fn push(&mut self, entry: KeyEntry, key: SigningKey) -> KeyId {
        let key_id = entry.key_id();
        self.entries.push(entry);
        self.secrets.insert(key_id, key);
        key_id
    }

    fn next_key(&mut self) -> SigningKey {
        SigningKey::generate(&mut self.rng)
    }
}

fn device_kind(device: &DeviceIdentity) -> KeyKind {
    KeyKind::Device {
        device_id: device.id(),
        name: device.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfam_core::DeviceId;

    #[test]
    fn test_built_family_verifies_and_keeps_secrets() {
        let phone = DeviceIdentity::new(DeviceId::new(), "phone").unwrap();
        let mut builder = FamilyBuilder::new("uma").with_pgp_eldest("0A0B", true);
        let device_key = builder.add_device(&phone);
        let family = builder.build();

        assert_eq!(family.entries().len(), 2);
        assert_eq!(
            family.computed().unwrap().device_sibkey(phone.id()).unwrap().key_id(),
            device_key
        );
        assert_eq!(
            KeyId::of(&builder.secret(&device_key).unwrap().verifying_key()),
            device_key
        );
    }
}
