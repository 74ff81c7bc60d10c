//! Ready-made fake users
//!
//! Each factory describes one account shape the login flow must handle: no
//! keys at all, a passphrase key, synced or public-only PGP keys, several PGP
//! keys, or an already provisioned device.

use crate::doubles::MemorySecretProvider;
use crate::family::FamilyBuilder;
use crate::server::MemoryIdentityServer;
use ed25519_dalek::SigningKey;
use keyfam_core::{DeviceId, DeviceIdentity, Identity, KeyId, KeyKind};

/// Device name the default prompter answers with
pub const TEST_DEVICE_NAME: &str = "my test device";

/// Deterministic hex fingerprint for the `index`-th PGP key of a fixture
pub fn pgp_fingerprint(index: usize) -> String {
    format!("{:040X}", 0x5EED_0000_usize + index)
}

/// A registered-to-be account with its keys and passphrase
#[derive(Debug, Clone)]
pub struct FakeUser {
    /// Family description, private keys included
    pub builder: FamilyBuilder,
    /// Account passphrase
    pub passphrase: String,
}

impl FakeUser {
    fn from_builder(builder: FamilyBuilder) -> Self {
        let passphrase = format!("{}-passphrase", builder.identity().username);
        Self {
            builder,
            passphrase,
        }
    }

    /// Account that never registered a key
    pub fn without_keys(username: &str) -> Self {
        Self::from_builder(FamilyBuilder::new(username))
    }

    /// Account whose only key is derived from the passphrase
    pub fn with_passphrase_key(username: &str) -> Self {
        Self::from_builder(FamilyBuilder::new(username).with_passphrase_eldest())
    }

    /// Account with one PGP key whose secret is synced with the account
    pub fn with_synced_pgp(username: &str) -> Self {
        Self::from_builder(FamilyBuilder::new(username).with_pgp_eldest(&pgp_fingerprint(0), true))
    }

    /// Account with one PGP key whose secret lives only in a keyring
    pub fn with_public_pgp(username: &str) -> Self {
        Self::from_builder(
            FamilyBuilder::new(username).with_pgp_eldest(&pgp_fingerprint(0), false),
        )
    }

    /// Account with `count` keyring-only PGP keys
    pub fn with_pgp_keys(username: &str, count: usize) -> Self {
        assert!(count > 0, "at least one PGP key");
        let mut builder = FamilyBuilder::new(username).with_pgp_eldest(&pgp_fingerprint(0), false);
        for index in 1..count {
            builder.add_pgp(&pgp_fingerprint(index), false);
        }
        Self::from_builder(builder)
    }

    /// Passphrase account with `device` already provisioned
    pub fn with_device(username: &str, device: &DeviceIdentity) -> Self {
        let mut builder = FamilyBuilder::new(username).with_passphrase_eldest();
        builder.add_device(device);
        Self::from_builder(builder)
    }

    /// The account identity
    pub fn identity(&self) -> &Identity {
        self.builder.identity()
    }

    /// The account username
    pub fn username(&self) -> &str {
        &self.builder.identity().username
    }

    /// Registered PGP keys as (key id, fingerprint)
    pub fn pgp_keys(&self) -> Vec<(KeyId, String)> {
        self.builder
            .entries()
            .iter()
            .filter_map(|entry| match &entry.kind {
                KeyKind::Pgp { fingerprint } => Some((entry.key_id(), fingerprint.clone())),
                _ => None,
            })
            .collect()
    }

    /// Private key of a provisioned device
    pub fn device_secret(&self, device_id: DeviceId) -> Option<SigningKey> {
        self.builder
            .entries()
            .iter()
            .rev()
            .find(|entry| entry.device_id() == Some(device_id))
            .and_then(|entry| self.builder.secret(&entry.key_id()))
    }

    /// Secret provider able to unlock the passphrase and PGP keys
    pub fn secrets(&self) -> MemorySecretProvider {
        let provider = MemorySecretProvider::new();
        self.fill_secrets(&provider);
        provider
    }

    /// Add the passphrase and PGP keys to an existing provider
    pub fn fill_secrets(&self, provider: &MemorySecretProvider) {
        for entry in self.builder.entries() {
            if entry.device_id().is_none() {
                if let Some(key) = self.builder.secret(&entry.key_id()) {
                    provider.insert(key);
                }
            }
        }
    }

    /// Register the account on a server
    pub fn register(&self, server: &MemoryIdentityServer) {
        server.register_family(&self.builder, &self.passphrase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_build_valid_families() {
        for user in [
            FakeUser::without_keys("a"),
            FakeUser::with_passphrase_key("b"),
            FakeUser::with_synced_pgp("c"),
            FakeUser::with_public_pgp("d"),
            FakeUser::with_pgp_keys("e", 3),
        ] {
            let family = user.builder.build();
            assert_eq!(family.identity().username, user.username());
        }
        assert_eq!(FakeUser::with_pgp_keys("f", 3).pgp_keys().len(), 3);
    }

    #[test]
    fn test_fingerprints_are_hex() {
        let fingerprint = pgp_fingerprint(2);
        assert_eq!(fingerprint.len(), 40);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
