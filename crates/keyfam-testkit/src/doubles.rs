//! Scripted and recording collaborators
//!
//! Each double records how it was called so tests can assert on counts
//! (key generations, signer prompts, remote fetches) as well as outcomes.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey};
use keyfam_core::effects::{
    DeviceKeyStore, KexStatus, KeyExchangeChannel, KeyGenerator, KeyReference, LoginPrompter,
    PgpKeyRef, PgpKeyring, PgpOrigin, PgpPublicKey, SecretProvider, SelectSignerResponse,
    SignerCandidate, SignerDecision,
};
use keyfam_core::{
    BindingStatement, DeviceId, DeviceIdentity, DeviceSigningKey, Identity, KeyId, KeyfamError,
    PrivateKeyHandle, Result, UserId,
};
use parking_lot::Mutex;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use zeroize::Zeroizing;

// =============================================================================
// Signer decisions
// =============================================================================

/// Decision handler that records every call and answers from a script
///
/// Unscripted selections accept the proposal.
#[derive(Debug, Default)]
pub struct RecordingDecision {
    script: Mutex<VecDeque<SelectSignerResponse>>,
    presented: Mutex<Vec<Vec<SignerCandidate>>>,
    words: Mutex<Vec<Vec<String>>>,
    statuses: Mutex<Vec<KexStatus>>,
    decline_fetch: bool,
    fetch_prompts: AtomicUsize,
}

impl RecordingDecision {
    /// Handler that accepts every proposal
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse remote keyring fetches
    pub fn declining_remote_fetch(mut self) -> Self {
        self.decline_fetch = true;
        self
    }

    /// Queue the answer to the next unanswered selection
    pub fn respond_with(self, response: SelectSignerResponse) -> Self {
        self.script.lock().push_back(response);
        self
    }

    /// Number of `select_signer` calls
    pub fn select_count(&self) -> usize {
        self.presented.lock().len()
    }

    /// Candidate lists presented, in call order
    pub fn presented(&self) -> Vec<Vec<SignerCandidate>> {
        self.presented.lock().clone()
    }

    /// Secret word lists displayed
    pub fn secret_words(&self) -> Vec<Vec<String>> {
        self.words.lock().clone()
    }

    /// Key-exchange statuses reported
    pub fn statuses(&self) -> Vec<KexStatus> {
        self.statuses.lock().clone()
    }

    /// Number of remote fetch confirmations asked for
    pub fn fetch_prompt_count(&self) -> usize {
        self.fetch_prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignerDecision for RecordingDecision {
    async fn select_signer(&self, candidates: &[SignerCandidate]) -> Result<SelectSignerResponse> {
        self.presented.lock().push(candidates.to_vec());
        Ok(self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(SelectSignerResponse::accept))
    }

    async fn confirm_remote_fetch(&self, _keys: &[PgpKeyRef]) -> Result<bool> {
        self.fetch_prompts.fetch_add(1, Ordering::SeqCst);
        Ok(!self.decline_fetch)
    }

    async fn display_secret_words(&self, words: &[String]) -> Result<()> {
        self.words.lock().push(words.to_vec());
        Ok(())
    }

    async fn kex_status(&self, status: KexStatus) -> Result<()> {
        self.statuses.lock().push(status);
        Ok(())
    }
}

// =============================================================================
// PGP keyring
// =============================================================================

/// Keyring with a local set and a remote store to fetch from
///
/// Listing returns every local key without matching; fetching moves a key
/// from the remote store into the local set.
#[derive(Debug, Default)]
pub struct ScriptedKeyring {
    local: Mutex<Vec<PgpKeyRef>>,
    remote: Mutex<HashMap<KeyId, PgpKeyRef>>,
    lists: AtomicUsize,
    fetches: AtomicUsize,
}

impl ScriptedKeyring {
    /// Empty keyring
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a private key in the local keyring
    pub fn add_local(&self, key_id: KeyId, fingerprint: &str) {
        self.local.lock().push(PgpKeyRef {
            key_id,
            fingerprint: fingerprint.to_string(),
            origin: PgpOrigin::LocalKeyring,
        });
    }

    /// Make a private key fetchable from the remote store
    pub fn add_remote(&self, key_id: KeyId, fingerprint: &str) {
        self.remote.lock().insert(
            key_id,
            PgpKeyRef {
                key_id,
                fingerprint: fingerprint.to_string(),
                origin: PgpOrigin::RemoteKeyring,
            },
        );
    }

    /// Keys currently in the local keyring
    pub fn local_keys(&self) -> Vec<PgpKeyRef> {
        self.local.lock().clone()
    }

    /// Number of listings
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Number of fetch attempts, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PgpKeyring for ScriptedKeyring {
    async fn list_matching_keys(&self, _registered: &[PgpPublicKey]) -> Result<Vec<PgpKeyRef>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.local.lock().clone())
    }

    async fn fetch_from_remote_store(&self, key: &PgpPublicKey) -> Result<PgpKeyRef> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let fetched = self.remote.lock().remove(&key.key_id).ok_or_else(|| {
            KeyfamError::not_found(format!("{} is not in the remote keyring", key.fingerprint))
        })?;
        self.local.lock().push(PgpKeyRef {
            origin: PgpOrigin::LocalKeyring,
            ..fetched.clone()
        });
        Ok(fetched)
    }
}

// =============================================================================
// Secrets
// =============================================================================

/// Secret provider holding unlocked keys in memory
#[derive(Debug, Default)]
pub struct MemorySecretProvider {
    keys: Mutex<HashMap<KeyId, SigningKey>>,
    reject: AtomicBool,
    unlocks: AtomicUsize,
}

impl MemorySecretProvider {
    /// Provider with no keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a key unlockable
    pub fn insert(&self, key: SigningKey) {
        self.keys.lock().insert(KeyId::of(&key.verifying_key()), key);
    }

    /// Reject every secret, as if the user typed the wrong one
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Number of unlock attempts
    pub fn unlock_count(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretProvider for MemorySecretProvider {
    async fn unlock(&self, key: &KeyReference) -> Result<PrivateKeyHandle> {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(KeyfamError::wrong_secret(key.to_string()));
        }
        self.keys
            .lock()
            .get(&key.key_id())
            .cloned()
            .map(PrivateKeyHandle::new)
            .ok_or_else(|| KeyfamError::not_found(format!("no secret for {key}")))
    }
}

// =============================================================================
// Key exchange
// =============================================================================

/// How a scripted peer answers signature requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBehavior {
    /// Sign immediately
    Approve,
    /// Sign after a delay
    Delay(Duration),
    /// Never answer
    Unresponsive,
    /// Refuse to sign
    Reject,
}

/// Other devices of the user, reached over a scripted channel
#[derive(Debug)]
pub struct ScriptedKexPeer {
    devices: Mutex<HashMap<DeviceId, SigningKey>>,
    behavior: Mutex<PeerBehavior>,
    words: Option<Vec<String>>,
    requests: Mutex<Vec<(DeviceId, KeyId)>>,
}

impl Default for ScriptedKexPeer {
    fn default() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            behavior: Mutex::new(PeerBehavior::Approve),
            words: None,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedKexPeer {
    /// Peer that approves every request
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and its sibkey
    pub fn with_device(self, device_id: DeviceId, key: SigningKey) -> Self {
        self.devices.lock().insert(device_id, key);
        self
    }

    /// Words displayed for the session
    pub fn with_secret_words(mut self, words: &[&str]) -> Self {
        self.words = Some(words.iter().map(|word| (*word).to_string()).collect());
        self
    }

    /// Change how later requests are answered
    pub fn set_behavior(&self, behavior: PeerBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Requests received, as (asked device, new key)
    pub fn requests(&self) -> Vec<(DeviceId, KeyId)> {
        self.requests.lock().clone()
    }

    fn sign(&self, signer: DeviceId, statement: &BindingStatement) -> Result<Signature> {
        let devices = self.devices.lock();
        let key = devices
            .get(&signer)
            .ok_or_else(|| KeyfamError::not_found(format!("{signer} is not reachable")))?;
        Ok(key.sign(&statement.to_bytes()?))
    }
}

#[async_trait]
impl KeyExchangeChannel for ScriptedKexPeer {
    async fn request_signature(
        &self,
        signer: DeviceId,
        statement: &BindingStatement,
    ) -> Result<Signature> {
        self.requests.lock().push((signer, statement.key_id));
        let behavior = *self.behavior.lock();
        match behavior {
            PeerBehavior::Approve => self.sign(signer, statement),
            PeerBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.sign(signer, statement)
            }
            PeerBehavior::Unresponsive => std::future::pending().await,
            PeerBehavior::Reject => Err(KeyfamError::authentication(format!(
                "{signer} refused to sign"
            ))),
        }
    }

    fn secret_words(&self) -> Option<Vec<String>> {
        self.words.clone()
    }
}

// =============================================================================
// Key generation and storage
// =============================================================================

/// Seeded key generator that counts generations
#[derive(Debug)]
pub struct CountingKeyGenerator {
    rng: Mutex<ChaCha20Rng>,
    generated: Mutex<Vec<KeyId>>,
}

impl CountingKeyGenerator {
    /// Generator with a fixed seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            generated: Mutex::new(Vec::new()),
        }
    }

    /// Number of keys generated
    pub fn count(&self) -> usize {
        self.generated.lock().len()
    }

    /// Ids of generated keys, in order
    pub fn generated(&self) -> Vec<KeyId> {
        self.generated.lock().clone()
    }
}

impl Default for CountingKeyGenerator {
    fn default() -> Self {
        Self::new(42)
    }
}

#[async_trait]
impl KeyGenerator for CountingKeyGenerator {
    async fn generate(&self) -> Result<DeviceSigningKey> {
        let key = DeviceSigningKey::generate(&mut *self.rng.lock());
        self.generated.lock().push(key.key_id());
        Ok(key)
    }
}

/// Keystore holding sealed seeds in memory
#[derive(Debug, Default)]
pub struct MemoryKeystore {
    sealed: Mutex<HashMap<(UserId, DeviceId), (KeyId, Zeroizing<[u8; 32]>)>>,
    fail: AtomicBool,
    seals: AtomicUsize,
}

impl MemoryKeystore {
    /// Empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every later seal with a storage error
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Key sealed for a user on a device
    pub fn sealed_key(&self, user: UserId, device: DeviceId) -> Option<KeyId> {
        self.sealed
            .lock()
            .get(&(user, device))
            .map(|(key_id, _)| *key_id)
    }

    /// Number of seal attempts
    pub fn seal_count(&self) -> usize {
        self.seals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceKeyStore for MemoryKeystore {
    async fn seal(
        &self,
        identity: &Identity,
        device: &DeviceIdentity,
        key: &DeviceSigningKey,
    ) -> Result<()> {
        self.seals.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(KeyfamError::storage("keystore is read-only"));
        }
        self.sealed.lock().insert(
            (identity.user_id, device.id()),
            (key.key_id(), key.secret_seed()),
        );
        Ok(())
    }
}

// =============================================================================
// Prompts
// =============================================================================

/// Prompter that always answers with the same device name
#[derive(Debug)]
pub struct FixedPrompter {
    name: String,
    prompts: AtomicUsize,
}

impl FixedPrompter {
    /// Prompter answering `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompts: AtomicUsize::new(0),
        }
    }

    /// Number of prompts answered
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl Default for FixedPrompter {
    fn default() -> Self {
        Self::new(crate::TEST_DEVICE_NAME)
    }
}

#[async_trait]
impl LoginPrompter for FixedPrompter {
    async fn prompt_device_name(&self) -> Result<String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self.name.clone())
    }
}
