//! keyfam Login - login orchestration and device provisioning
//!
//! Logging in on a device means authenticating the user and making sure the
//! device holds an active key in the user's key family. When it does not, a
//! new key is generated and signed by an existing credential:
//!
//! - [`classifier`]: where the device stands (no keys, provisioned, needs a key)
//! - [`selector`]: which existing credential signs the new key
//! - [`engine`]: the provisioning state machine
//! - [`orchestrator`]: the login entry point and session handling
//!
//! All collaborators are injected through [`LoginEffects`].
//!
//! # Example
//!
//! ```rust,ignore
//! use keyfam_login::{LoginOrchestrator, LoginRequest};
//!
//! let orchestrator = LoginOrchestrator::new(effects, config, device_id)?;
//! let session = orchestrator
//!     .login(&LoginRequest::new("alice", passphrase), None)
//!     .await?;
//! ```

#![forbid(unsafe_code)]

pub mod classifier;
pub mod decision;
pub mod effects;
pub mod engine;
pub mod orchestrator;
pub mod selector;
pub mod session;

pub use classifier::{classify, ProvisioningState};
pub use decision::{NonInteractiveDecision, PreferPgpSigner};
pub use effects::LoginEffects;
pub use engine::{
    CancelToken, DeviceProvisioner, InFlightRegistry, ProvisioningOutcome, ProvisioningReport,
    Stage,
};
pub use orchestrator::LoginOrchestrator;
pub use selector::{CandidateSet, SignerCategory, SignerSelector};
pub use session::{LoginRequest, Session};
