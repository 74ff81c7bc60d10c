//! Collaborator effect traits
//!
//! Pure trait definitions for everything the login flow consumes but does not
//! implement: the identity server, secret unlocking, device-to-device key
//! exchange, the user's signer decisions, the PGP keyring, prompts, key
//! generation and the local keystore.
//!
//! # Effect Classification
//!
//! ## Remote Effects (identity server, key exchange)
//! - **Identity**, **Store**, **KeyExchange**
//!
//! ## Local Effects (device and user)
//! - **Secrets**, **Keyring**, **KeyGeneration**, **Keystore**
//!
//! ## Interaction Effects (interactive or scripted)
//! - **Decision**, **Prompt**
//!
//! All login code is parameterized by these traits; `keyfam-testkit` provides
//! deterministic handlers for tests.

pub mod decision;
pub mod identity;
pub mod kex;
pub mod keygen;
pub mod keyring;
pub mod keystore;
pub mod prompt;
pub mod secrets;
pub mod store;

pub use decision::{
    PgpKeyRef, PgpOrigin, SelectSignerAction, SelectSignerResponse, SignerCandidate,
    SignerDecision,
};
pub use identity::IdentityService;
pub use kex::{KexStatus, KeyExchangeChannel};
pub use keygen::{KeyGenerator, OsKeyGenerator};
pub use keyring::{PgpKeyring, PgpPublicKey};
pub use keystore::DeviceKeyStore;
pub use prompt::LoginPrompter;
pub use secrets::{KeyReference, SecretProvider};
pub use store::{KeyFamilyStore, ProvisioningResult, SubmitAck};
