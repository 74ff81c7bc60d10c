//! Key entries and the statements that bind them into a family

use crate::types::{DeviceId, Identity, KeyId, UserId};
use crate::Result;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain tag prefixed to every binding statement
pub const BINDING_DOMAIN: &[u8] = b"keyfam/binding/v1\n";

/// Authority of a key within its family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    /// Root of trust, self-signed
    Eldest,
    /// Signing key with the same authority as the eldest key
    Sibkey,
    /// Encryption key; never signs other keys
    Subkey,
}

impl KeyRole {
    /// Whether keys of this role may sign new entries
    pub fn can_sign(&self) -> bool {
        matches!(self, KeyRole::Eldest | KeyRole::Sibkey)
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Eldest => write!(f, "eldest"),
            KeyRole::Sibkey => write!(f, "sibkey"),
            KeyRole::Subkey => write!(f, "subkey"),
        }
    }
}

/// What kind of credential a key is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyKind {
    /// Key held by one device installation
    Device {
        /// Device holding the key
        device_id: DeviceId,
        /// Device name at registration time
        name: String,
    },
    /// PGP key controlled by the user
    Pgp {
        /// PGP fingerprint, uppercase hex
        fingerprint: String,
    },
    /// Key derived from the account passphrase
    Passphrase,
}

impl KeyKind {
    /// Device bound to this key, if any
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            KeyKind::Device { device_id, .. } => Some(*device_id),
            _ => None,
        }
    }

    /// Whether this is a PGP key
    pub fn is_pgp(&self) -> bool {
        matches!(self, KeyKind::Pgp { .. })
    }
}

/// Canonical statement signed when a key joins a family
///
/// Covers the new public key, its role and device metadata, the signer, and
/// the link to the eldest key. Field order is fixed so the JSON encoding is
/// canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingStatement {
    /// Owner of the family
    pub user_id: UserId,
    /// Owner's username
    pub username: String,
    /// Role of the new key
    pub role: KeyRole,
    /// Kind and device metadata of the new key
    pub kind: KeyKind,
    /// Identifier of the new key
    pub key_id: KeyId,
    /// New public key, hex
    pub public_key: String,
    /// Key that signs this statement
    pub signer: KeyId,
    /// Eldest key of the family; equals `key_id` for the eldest itself
    pub eldest: KeyId,
}

impl BindingStatement {
    /// Build the statement for a new key
    pub fn new(
        identity: &Identity,
        role: KeyRole,
        kind: KeyKind,
        public_key: &VerifyingKey,
        signer: KeyId,
        eldest: KeyId,
    ) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username.clone(),
            role,
            kind,
            key_id: KeyId::of(public_key),
            public_key: hex::encode(public_key.as_bytes()),
            signer,
            eldest,
        }
    }

    /// Statement for a self-signed eldest key
    pub fn eldest(identity: &Identity, kind: KeyKind, public_key: &VerifyingKey) -> Self {
        let key_id = KeyId::of(public_key);
        Self::new(identity, KeyRole::Eldest, kind, public_key, key_id, key_id)
    }

    /// Bytes that signers sign
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = BINDING_DOMAIN.to_vec();
        bytes.extend(serde_json::to_vec(self)?);
        Ok(bytes)
    }
}

/// One registered key as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Public key material
    pub public_key: VerifyingKey,
    /// Authority of the key
    pub role: KeyRole,
    /// Kind of credential
    pub kind: KeyKind,
    /// Key that signed the binding statement
    pub signer: KeyId,
    /// Signature by `signer` over the binding statement
    pub signature: Signature,
    /// Signature by the key itself over the same statement (sibkeys)
    pub reverse_signature: Option<Signature>,
    /// Revoked keys stay in the chain but are no longer active
    pub revoked: bool,
    /// Private material is stored encrypted alongside the account
    pub synced_secret: bool,
}

impl KeyEntry {
    /// Identifier of this key
    pub fn key_id(&self) -> KeyId {
        KeyId::of(&self.public_key)
    }

    /// Whether the key has not been revoked
    pub fn is_active(&self) -> bool {
        !self.revoked
    }

    /// Device bound to this key, if any
    pub fn device_id(&self) -> Option<DeviceId> {
        self.kind.device_id()
    }

    /// Rebuild the statement this entry was signed over
    pub fn statement(&self, identity: &Identity, eldest: KeyId) -> BindingStatement {
        BindingStatement::new(
            identity,
            self.role,
            self.kind.clone(),
            &self.public_key,
            self.signer,
            eldest,
        )
    }
}

/// Server-provided view of a user's keys, not yet verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFamilySnapshot {
    /// Owner of the keys
    pub identity: Identity,
    /// Entries in registration order
    pub entries: Vec<KeyEntry>,
}

impl KeyFamilySnapshot {
    /// Snapshot of a user who never registered a key
    pub fn empty(identity: Identity) -> Self {
        Self {
            identity,
            entries: Vec::new(),
        }
    }
}
