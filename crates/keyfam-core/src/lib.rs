//! keyfam Core - key family model and collaborator interfaces
//!
//! This crate holds everything the login flow reasons about but does not
//! orchestrate:
//!
//! - **Identifiers**: `UserId`, `DeviceId`, `KeyId`, `Identity`, `DeviceIdentity`
//! - **Key family**: verified, append-only record of a user's keys and the
//!   computed view of the active ones
//! - **Keys**: zeroizing wrappers around private key material
//! - **Effects**: traits for the identity server, secrets, key exchange,
//!   signer decisions, PGP keyrings, prompts, key generation and keystores
//! - **Config**: `LoginConfig` and its loading contract
//! - **Errors**: the unified `KeyfamError`
//!
//! The provisioning state machine itself lives in `keyfam-login`.

#![forbid(unsafe_code)]

/// Login and provisioning configuration
pub mod config;

/// Collaborator effect traits
pub mod effects;

/// Unified error handling
pub mod errors;

/// Key family model and chain verification
pub mod key_family;

/// Private key wrappers
pub mod keys;

/// Identifier and identity types
pub mod types;

pub use config::{KeyfamConfig, LoginConfig};
pub use errors::{KeyfamError, Result};
pub use key_family::{
    BindingStatement, ComputedKeyFamily, KeyEntry, KeyFamily, KeyFamilySnapshot, KeyKind, KeyRole,
};
pub use keys::{DeviceSigningKey, PrivateKeyHandle};
pub use types::{DeviceId, DeviceIdentity, Identity, KeyId, UserId};
