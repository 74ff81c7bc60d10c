//! Private key wrappers
//!
//! Both wrappers hold an `ed25519_dalek::SigningKey`, which zeroizes its
//! secret scalar on drop. Neither type is `Clone` and neither prints its
//! secret in `Debug`, so a key lives exactly as long as the scope that owns it.

use crate::types::KeyId;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::Zeroizing;

/// Freshly generated device signing key
pub struct DeviceSigningKey {
    signing_key: SigningKey,
    key_id: KeyId,
}

impl DeviceSigningKey {
    /// Generate a key from a cryptographically secure RNG
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(seed.as_mut());
        Self::from_seed(&seed)
    }

    /// Build a key from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let key_id = KeyId::of(&signing_key.verifying_key());
        Self {
            signing_key,
            key_id,
        }
    }

    /// Public half of the key
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Identifier of the public key
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Secret seed, for keystores that encrypt it at rest
    pub fn secret_seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for DeviceSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Unlocked private key of an existing signer
///
/// Returned by a `SecretProvider`; dropping the handle scrubs the key.
pub struct PrivateKeyHandle {
    signing_key: SigningKey,
    key_id: KeyId,
}

impl PrivateKeyHandle {
    /// Wrap unlocked key material
    pub fn new(signing_key: SigningKey) -> Self {
        let key_id = KeyId::of(&signing_key.verifying_key());
        Self {
            signing_key,
            key_id,
        }
    }

    /// Identifier of the unlocked key
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyHandle")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_generated_keys_differ() {
        let a = DeviceSigningKey::generate(&mut OsRng);
        let b = DeviceSigningKey::generate(&mut OsRng);
        assert_ne!(a.key_id(), b.key_id());
    }

    #[test]
    fn test_signature_verifies_under_public_key() {
        let key = DeviceSigningKey::from_seed(&[3u8; 32]);
        let sig = key.sign(b"bind me");
        assert!(key.public_key().verify_strict(b"bind me", &sig).is_ok());
        assert_eq!(key.key_id(), KeyId::of(&key.public_key()));
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = DeviceSigningKey::from_seed(&[5u8; 32]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("DeviceSigningKey"));
        assert!(!rendered.contains(&hex::encode([5u8; 32])));
    }
}
