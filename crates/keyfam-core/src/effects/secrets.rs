//! Secret provider effect

use crate::effects::decision::PgpKeyRef;
use crate::keys::PrivateKeyHandle;
use crate::types::KeyId;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key whose private material must be unlocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyReference {
    /// PGP key, synced or from a keyring
    Pgp(PgpKeyRef),
    /// Passphrase-derived key
    Passphrase {
        /// Registered key id
        key_id: KeyId,
    },
}

impl KeyReference {
    /// Key id of the referenced key
    pub fn key_id(&self) -> KeyId {
        match self {
            KeyReference::Pgp(pgp) => pgp.key_id,
            KeyReference::Passphrase { key_id } => *key_id,
        }
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyReference::Pgp(pgp) => write!(f, "pgp:{}", pgp.fingerprint),
            KeyReference::Passphrase { key_id } => write!(f, "passphrase:{}", key_id.short()),
        }
    }
}

/// Unlocks private key material, prompting for a secret as needed
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Unlock a key; fails with `WrongSecret` when the secret is rejected
    async fn unlock(&self, key: &KeyReference) -> Result<PrivateKeyHandle>;
}
