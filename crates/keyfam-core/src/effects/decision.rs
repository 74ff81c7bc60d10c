//! Signer decision effect
//!
//! The decision capability chooses which existing credential authorizes a new
//! device key. It is injected: interactive front ends ask the user, scripted
//! handlers answer deterministically. Its answer is authoritative.

use crate::effects::kex::KexStatus;
use crate::types::{DeviceId, KeyId};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a PGP key's private material was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PgpOrigin {
    /// Stored encrypted alongside the account
    LocalSynced,
    /// Present in a local keyring
    LocalKeyring,
    /// Fetched from an external keyring source
    RemoteKeyring,
}

/// Reference to a PGP key usable as a signer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PgpKeyRef {
    /// Key id of the registered public key
    pub key_id: KeyId,
    /// PGP fingerprint
    pub fingerprint: String,
    /// Where the private material lives
    pub origin: PgpOrigin,
}

/// An existing credential that could authorize the new device key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignerCandidate {
    /// Another device of the user, reached over key exchange
    Device {
        /// Remote device
        device_id: DeviceId,
        /// Remote device name
        name: String,
        /// Its active sibkey
        key_id: KeyId,
    },
    /// A PGP key controlled by the user
    Pgp(PgpKeyRef),
    /// The user's passphrase-derived key
    Passphrase {
        /// Registered passphrase key
        key_id: KeyId,
    },
}

impl SignerCandidate {
    /// Key that will sign the binding statement
    pub fn key_id(&self) -> KeyId {
        match self {
            SignerCandidate::Device { key_id, .. } => *key_id,
            SignerCandidate::Pgp(pgp) => pgp.key_id,
            SignerCandidate::Passphrase { key_id } => *key_id,
        }
    }

    /// Whether two candidates denote the same signer
    ///
    /// Devices match by device id, keys by key id.
    pub fn same_signer(&self, other: &SignerCandidate) -> bool {
        match (self, other) {
            (
                SignerCandidate::Device { device_id: a, .. },
                SignerCandidate::Device { device_id: b, .. },
            ) => a == b,
            (SignerCandidate::Pgp(a), SignerCandidate::Pgp(b)) => a.key_id == b.key_id,
            (
                SignerCandidate::Passphrase { key_id: a },
                SignerCandidate::Passphrase { key_id: b },
            ) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SignerCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerCandidate::Device { name, device_id, .. } => {
                write!(f, "device {name:?} ({device_id})")
            }
            SignerCandidate::Pgp(pgp) => {
                write!(f, "pgp key {} ({:?})", pgp.fingerprint, pgp.origin)
            }
            SignerCandidate::Passphrase { key_id } => {
                write!(f, "passphrase key {}", key_id.short())
            }
        }
    }
}

/// What the decision capability wants to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectSignerAction {
    /// Sign the new device key
    Sign,
    /// Stop provisioning
    Abort,
}

/// Answer of the decision capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectSignerResponse {
    /// Sign or abort
    pub action: SelectSignerAction,
    /// Explicit choice; `None` accepts a single proposed candidate
    pub chosen: Option<SignerCandidate>,
}

impl SelectSignerResponse {
    /// Accept the single proposed candidate
    pub fn accept() -> Self {
        Self {
            action: SelectSignerAction::Sign,
            chosen: None,
        }
    }

    /// Sign with an explicit candidate
    pub fn sign_with(candidate: SignerCandidate) -> Self {
        Self {
            action: SelectSignerAction::Sign,
            chosen: Some(candidate),
        }
    }

    /// Abort provisioning
    pub fn abort() -> Self {
        Self {
            action: SelectSignerAction::Abort,
            chosen: None,
        }
    }
}

/// Decision capability consulted during signer selection
#[async_trait]
pub trait SignerDecision: Send + Sync {
    /// Choose among the candidates of one signer category
    async fn select_signer(&self, candidates: &[SignerCandidate]) -> Result<SelectSignerResponse>;

    /// Confirm fetching private material for public-only PGP keys
    async fn confirm_remote_fetch(&self, _keys: &[PgpKeyRef]) -> Result<bool> {
        Ok(true)
    }

    /// Show the words the other device must enter during key exchange
    async fn display_secret_words(&self, _words: &[String]) -> Result<()> {
        Ok(())
    }

    /// Progress of a device-to-device key exchange
    async fn kex_status(&self, _status: KexStatus) -> Result<()> {
        Ok(())
    }
}
