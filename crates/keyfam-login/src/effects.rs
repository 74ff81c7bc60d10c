//! Collaborator bundle for login and provisioning

use keyfam_core::effects::{
    DeviceKeyStore, IdentityService, KeyExchangeChannel, KeyFamilyStore, KeyGenerator,
    LoginPrompter, PgpKeyring, SecretProvider, SignerDecision,
};
use std::fmt;
use std::sync::Arc;

/// Every collaborator the login flow consumes
///
/// `kex` is absent on installations that cannot reach other devices; device
/// signers are then never offered.
#[derive(Clone)]
pub struct LoginEffects {
    /// Credential check
    pub identity: Arc<dyn IdentityService>,
    /// Key family storage
    pub store: Arc<dyn KeyFamilyStore>,
    /// Unlocking of existing private keys
    pub secrets: Arc<dyn SecretProvider>,
    /// Signer decisions and progress display
    pub decision: Arc<dyn SignerDecision>,
    /// PGP keyring access
    pub keyring: Arc<dyn PgpKeyring>,
    /// Device-to-device key exchange
    pub kex: Option<Arc<dyn KeyExchangeChannel>>,
    /// New key material
    pub keygen: Arc<dyn KeyGenerator>,
    /// Local storage of the new device key
    pub keystore: Arc<dyn DeviceKeyStore>,
    /// Device name prompt
    pub prompter: Arc<dyn LoginPrompter>,
}

impl LoginEffects {
    /// Replace the decision handler
    pub fn with_decision(mut self, decision: Arc<dyn SignerDecision>) -> Self {
        self.decision = decision;
        self
    }

    /// Attach or remove the key-exchange channel
    pub fn with_kex(mut self, kex: Option<Arc<dyn KeyExchangeChannel>>) -> Self {
        self.kex = kex;
        self
    }
}

impl fmt::Debug for LoginEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginEffects")
            .field("kex", &self.kex.is_some())
            .finish_non_exhaustive()
    }
}
