//! PGP keyring effect

use crate::effects::decision::PgpKeyRef;
use crate::types::KeyId;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A PGP public key registered in the key family
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PgpPublicKey {
    /// Key id in the family
    pub key_id: KeyId,
    /// PGP fingerprint
    pub fingerprint: String,
}

/// Local and remote PGP keyring access
#[async_trait]
pub trait PgpKeyring: Send + Sync {
    /// Keys in the local keyring whose private half matches a registered key
    async fn list_matching_keys(&self, registered: &[PgpPublicKey]) -> Result<Vec<PgpKeyRef>>;

    /// Bring a key's private material in from an external keyring source
    async fn fetch_from_remote_store(&self, key: &PgpPublicKey) -> Result<PgpKeyRef>;
}
