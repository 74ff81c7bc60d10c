//! keyfam Testing Infrastructure
//!
//! Deterministic, in-memory implementations of every collaborator the login
//! flow consumes, plus builders for signed key families and ready-made fake
//! users.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! keyfam-testkit = { path = "../keyfam-testkit" }
//! ```
//!
//! ```rust,ignore
//! use keyfam_testkit::*;
//!
//! let user = FakeUser::with_passphrase_key("alice");
//! let server = MemoryIdentityServer::new();
//! user.register(&server);
//! ```

pub mod doubles;
pub mod family;
pub mod fixtures;
pub mod server;

pub use doubles::{
    CountingKeyGenerator, FixedPrompter, MemoryKeystore, MemorySecretProvider, PeerBehavior,
    RecordingDecision, ScriptedKexPeer, ScriptedKeyring,
};
pub use family::FamilyBuilder;
pub use fixtures::{pgp_fingerprint, FakeUser, TEST_DEVICE_NAME};
pub use server::MemoryIdentityServer;

use keyfam_core::{Identity, KeyId, UserId};
use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber; later calls are no-ops
///
/// Honors `RUST_LOG`, defaulting to `warn`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Fresh identity with a random user id
pub fn identity(username: &str) -> Identity {
    Identity::new(UserId::new(), username)
}

/// Key id that belongs to no family
pub fn stray_key_id() -> KeyId {
    KeyId([0xEE; 32])
}
