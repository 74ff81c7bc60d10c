//! Local device keystore effect

use crate::keys::DeviceSigningKey;
use crate::types::{DeviceIdentity, Identity};
use crate::Result;
use async_trait::async_trait;

/// Persists the device's private key, encrypted at rest
#[async_trait]
pub trait DeviceKeyStore: Send + Sync {
    /// Encrypt and store the new device key
    async fn seal(
        &self,
        identity: &Identity,
        device: &DeviceIdentity,
        key: &DeviceSigningKey,
    ) -> Result<()>;
}
