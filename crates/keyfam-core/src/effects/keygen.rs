//! Key generation effect
//!
//! Production uses the operating system RNG. Tests inject deterministic
//! generators so key material and generation counts are reproducible.

use crate::keys::DeviceSigningKey;
use crate::Result;
use async_trait::async_trait;
use rand::rngs::OsRng;

/// Source of new device key pairs
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// Generate a new device signing key
    async fn generate(&self) -> Result<DeviceSigningKey>;
}

/// Key generator backed by the OS RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsKeyGenerator;

#[async_trait]
impl KeyGenerator for OsKeyGenerator {
    async fn generate(&self) -> Result<DeviceSigningKey> {
        Ok(DeviceSigningKey::generate(&mut OsRng))
    }
}
