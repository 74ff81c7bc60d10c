//! Key family store effect
//!
//! Remote storage of key families. Submissions are append-only: the store
//! validates and records the new entry, and the local side only observes it
//! after reloading.

use crate::key_family::{KeyEntry, KeyFamilySnapshot};
use crate::types::{Identity, KeyId};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A new key entry ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    /// Owner of the family being extended
    pub identity: Identity,
    /// New entry with its binding (and reverse) signature
    pub entry: KeyEntry,
}

impl ProvisioningResult {
    /// Key id of the new entry
    pub fn key_id(&self) -> KeyId {
        self.entry.key_id()
    }
}

/// Store acknowledgement of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Key the store accepted
    pub key_id: KeyId,
    /// Position of the entry in the family, as assigned by the store
    pub seqno: u64,
}

/// Authoritative key-family storage
///
/// `submit` appends one entry; the store rejects entries that do not extend
/// the chain it holds.
#[async_trait]
pub trait KeyFamilyStore: Send + Sync {
    /// Fetch the current snapshot of an identity's keys
    ///
    /// Fails with `NotFound` if the identity is unknown.
    async fn load(&self, identity: &Identity) -> Result<KeyFamilySnapshot>;

    /// Append a new entry to the identity's family
    async fn submit(&self, result: ProvisioningResult) -> Result<SubmitAck>;
}
