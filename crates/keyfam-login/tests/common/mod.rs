//! Shared wiring for login integration tests

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use keyfam_core::effects::SignerDecision;
use keyfam_core::{DeviceId, DeviceIdentity, LoginConfig};
use keyfam_login::{DeviceProvisioner, LoginEffects, LoginOrchestrator, LoginRequest};
use keyfam_testkit::{
    CountingKeyGenerator, FakeUser, FixedPrompter, MemoryIdentityServer, MemoryKeystore,
    MemorySecretProvider, RecordingDecision, ScriptedKexPeer, ScriptedKeyring, TEST_DEVICE_NAME,
};
use std::sync::Arc;

/// One device with in-memory collaborators and a registered user
pub struct Harness {
    pub user: FakeUser,
    pub device: DeviceIdentity,
    pub server: Arc<MemoryIdentityServer>,
    pub decision: Arc<RecordingDecision>,
    pub keyring: Arc<ScriptedKeyring>,
    pub secrets: Arc<MemorySecretProvider>,
    pub kex: Option<Arc<ScriptedKexPeer>>,
    pub keygen: Arc<CountingKeyGenerator>,
    pub keystore: Arc<MemoryKeystore>,
    pub prompter: Arc<FixedPrompter>,
}

impl Harness {
    pub fn new(user: FakeUser) -> Self {
        keyfam_testkit::init_test_tracing();
        let server = Arc::new(MemoryIdentityServer::new());
        user.register(&server);
        let secrets = Arc::new(user.secrets());
        Self {
            user,
            device: DeviceIdentity::new(DeviceId::new(), TEST_DEVICE_NAME).unwrap(),
            server,
            decision: Arc::new(RecordingDecision::new()),
            keyring: Arc::new(ScriptedKeyring::new()),
            secrets,
            kex: None,
            keygen: Arc::new(CountingKeyGenerator::default()),
            keystore: Arc::new(MemoryKeystore::new()),
            prompter: Arc::new(FixedPrompter::default()),
        }
    }

    /// Register another account on the same server
    pub fn add_user(&self, other: &FakeUser) {
        other.register(&self.server);
        other.fill_secrets(&self.secrets);
    }

    pub fn with_decision(mut self, decision: RecordingDecision) -> Self {
        self.decision = Arc::new(decision);
        self
    }

    pub fn with_kex(mut self, peer: ScriptedKexPeer) -> Self {
        self.kex = Some(Arc::new(peer));
        self
    }

    pub fn kex(&self) -> &ScriptedKexPeer {
        self.kex.as_deref().unwrap()
    }

    pub fn effects(&self) -> LoginEffects {
        LoginEffects {
            identity: self.server.clone(),
            store: self.server.clone(),
            secrets: self.secrets.clone(),
            decision: self.decision.clone(),
            keyring: self.keyring.clone(),
            kex: self
                .kex
                .clone()
                .map(|peer| peer as Arc<dyn keyfam_core::effects::KeyExchangeChannel>),
            keygen: self.keygen.clone(),
            keystore: self.keystore.clone(),
            prompter: self.prompter.clone(),
        }
    }

    pub fn effects_with_decision(&self, decision: Arc<dyn SignerDecision>) -> LoginEffects {
        self.effects().with_decision(decision)
    }

    pub fn provisioner(&self, config: LoginConfig) -> DeviceProvisioner {
        DeviceProvisioner::new(self.effects(), config)
    }

    pub fn orchestrator(&self, config: LoginConfig) -> LoginOrchestrator {
        LoginOrchestrator::new(self.effects(), config, self.device.id()).unwrap()
    }

    pub fn request(&self) -> LoginRequest {
        LoginRequest::new(self.user.username(), self.user.passphrase.clone())
    }

    /// Put every registered PGP key of the user in the local keyring
    pub fn stock_local_keyring(&self) {
        for (key_id, fingerprint) in self.user.pgp_keys() {
            self.keyring.add_local(key_id, &fingerprint);
        }
    }

    /// Make every registered PGP key of the user fetchable remotely
    pub fn stock_remote_keyring(&self) {
        for (key_id, fingerprint) in self.user.pgp_keys() {
            self.keyring.add_remote(key_id, &fingerprint);
        }
    }
}

/// Configuration with a short key-exchange timeout
pub fn quick_config() -> LoginConfig {
    LoginConfig {
        kex_timeout_secs: 5,
        ..LoginConfig::default()
    }
}
