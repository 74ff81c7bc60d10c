//! Device provisioning engine
//!
//! Drives one attempt through the provisioning stages:
//!
//! ```text
//! Start ─► Classify ─► SelectSigner ─► Authorize ─► GenerateKey ─► Sign ─► Submit ─► Verify ─► Done
//!              │                                        ▲
//!              ├── HasDeviceKey ─────────────────────── │ ─────────────────────────────────► Done
//!              └── NoKeysAtAll ─────────────────────────┘  (new key becomes the eldest)
//! ```
//!
//! Any failure aborts the attempt with no local side effects except a sealed
//! key whose registration never completed. Retrying restarts at `Start` and
//! reclassifies from a fresh reload.

mod cancel;
mod guard;
mod report;

pub use cancel::CancelToken;
pub use guard::{InFlightGuard, InFlightRegistry};
pub use report::{ProvisioningOutcome, ProvisioningReport, Stage};

use crate::classifier::{classify, ProvisioningState};
use crate::effects::LoginEffects;
use crate::selector::SignerSelector;
use ed25519_dalek::Signature;
use keyfam_core::effects::{
    KexStatus, KeyExchangeChannel, KeyReference, ProvisioningResult, SignerCandidate,
};
use keyfam_core::key_family::{self, BindingStatement, KeyEntry, KeyKind, KeyRole};
use keyfam_core::{
    DeviceId, DeviceIdentity, DeviceSigningKey, Identity, KeyFamily, KeyId, KeyfamError,
    LoginConfig, PrivateKeyHandle, Result,
};
use report::StageTrace;
use std::sync::Arc;

/// How the binding statement of the new key will be signed
enum Authorization {
    /// No signer: the new key is self-signed as the eldest key
    Eldest,
    /// An unlocked local key
    Local {
        candidate: SignerCandidate,
        handle: PrivateKeyHandle,
    },
    /// Another device, reached over key exchange
    Remote {
        candidate: SignerCandidate,
        device_id: DeviceId,
        channel: Arc<dyn KeyExchangeChannel>,
    },
}

impl Authorization {
    fn candidate(&self) -> Option<&SignerCandidate> {
        match self {
            Authorization::Eldest => None,
            Authorization::Local { candidate, .. } | Authorization::Remote { candidate, .. } => {
                Some(candidate)
            }
        }
    }
}

/// Provisions a key for the local device
#[derive(Debug, Clone)]
pub struct DeviceProvisioner {
    effects: LoginEffects,
    config: LoginConfig,
    in_flight: InFlightRegistry,
}

impl DeviceProvisioner {
    /// Create a provisioner with its own in-flight registry
    pub fn new(effects: LoginEffects, config: LoginConfig) -> Self {
        Self {
            effects,
            config,
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Share an in-flight registry with other provisioners
    pub fn with_registry(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    /// Registry of attempts in flight
    pub fn registry(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Run one provisioning attempt
    pub async fn provision(
        &self,
        identity: &Identity,
        device: &DeviceIdentity,
    ) -> Result<ProvisioningReport> {
        self.provision_with_cancel(identity, device, &CancelToken::new())
            .await
    }

    /// Run one provisioning attempt, abandoning a key-exchange wait on `cancel`
    pub async fn provision_with_cancel(
        &self,
        identity: &Identity,
        device: &DeviceIdentity,
        cancel: &CancelToken,
    ) -> Result<ProvisioningReport> {
        let _slot = self.in_flight.try_acquire(identity, device.id())?;
        let mut trace = StageTrace::default();

        let result = self.run(identity, device, cancel, &mut trace).await;
        match &result {
            Ok(report) => tracing::info!(
                user = %identity.username,
                device = %device.id(),
                key = %report.key_id().short(),
                provisioned = report.was_provisioned(),
                "Provisioning finished"
            ),
            Err(error) => tracing::warn!(
                user = %identity.username,
                device = %device.id(),
                stage = %trace.current(),
                %error,
                "Provisioning failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        identity: &Identity,
        device: &DeviceIdentity,
        cancel: &CancelToken,
        trace: &mut StageTrace,
    ) -> Result<ProvisioningReport> {
        trace.enter(Stage::Start);
        let family = key_family::load(self.effects.store.as_ref(), identity).await?;

        trace.enter(Stage::Classify);
        let computed = family.computed();
        let state_before = classify(&family, computed.as_ref(), device);
        tracing::debug!(state = %state_before, "Classified device");

        let authorization = match (state_before, computed.as_ref()) {
            (ProvisioningState::HasDeviceKey { key_id }, _) => {
                trace.enter(Stage::Done);
                return Ok(ProvisioningReport {
                    device_id: device.id(),
                    state_before,
                    outcome: ProvisioningOutcome::AlreadyProvisioned { key_id },
                    stages: trace.stages(),
                });
            }
            (ProvisioningState::NeedsProvisioning { .. }, Some(computed)) => {
                trace.enter(Stage::SelectSigner);
                let candidate = SignerSelector::new(
                    self.effects.decision.as_ref(),
                    self.effects.keyring.as_ref(),
                )
                .with_key_exchange(self.effects.kex.is_some())
                .with_remote_fetch(self.config.remote_keyring_fetch)
                .select(computed, device)
                .await?;

                trace.enter(Stage::Authorize);
                self.authorize(candidate).await?
            }
            (ProvisioningState::NeedsProvisioning { .. }, None) => {
                return Err(KeyfamError::integrity(
                    "family has an eldest key but no computed view",
                ));
            }
            (ProvisioningState::NoKeysAtAll, _) => Authorization::Eldest,
        };
        let signer = authorization.candidate().cloned();

        trace.enter(Stage::GenerateKey);
        let entry = {
            let new_key = self.effects.keygen.generate().await?;
            tracing::debug!(key = %new_key.key_id().short(), "Generated device key");

            trace.enter(Stage::Sign);
            let entry = self
                .sign(identity, device, &family, authorization, &new_key, cancel)
                .await?;
            self.effects.keystore.seal(identity, device, &new_key).await?;
            entry
        };
        let submitted = entry.key_id();

        trace.enter(Stage::Submit);
        let ack = self
            .effects
            .store
            .submit(ProvisioningResult {
                identity: identity.clone(),
                entry,
            })
            .await?;
        tracing::debug!(key = %ack.key_id.short(), seqno = ack.seqno, "Store accepted key");

        trace.enter(Stage::Verify);
        let reloaded = key_family::load(self.effects.store.as_ref(), identity).await?;
        let key_id = match ProvisioningState::of(&reloaded, device) {
            ProvisioningState::HasDeviceKey { key_id } => key_id,
            state => {
                return Err(KeyfamError::incomplete(format!(
                    "store acknowledged key {} but the device is still in state: {state}",
                    submitted.short()
                )));
            }
        };
        if key_id != submitted {
            tracing::debug!(
                active = %key_id.short(),
                submitted = %submitted.short(),
                "Device holds a different active key than the one submitted"
            );
        }

        trace.enter(Stage::Done);
        Ok(ProvisioningReport {
            device_id: device.id(),
            state_before,
            outcome: ProvisioningOutcome::Provisioned {
                key_id,
                submitted,
                signer,
                seqno: ack.seqno,
            },
            stages: trace.stages(),
        })
    }

    async fn authorize(&self, candidate: SignerCandidate) -> Result<Authorization> {
        let reference = match &candidate {
            SignerCandidate::Device { device_id, .. } => {
                let device_id = *device_id;
                let channel = self.effects.kex.clone().ok_or_else(|| {
                    KeyfamError::no_signer("device signer chosen without a key-exchange channel")
                })?;
                if let Some(words) = channel.secret_words() {
                    self.effects.decision.display_secret_words(&words).await?;
                }
                return Ok(Authorization::Remote {
                    device_id,
                    candidate,
                    channel,
                });
            }
            SignerCandidate::Pgp(key) => KeyReference::Pgp(key.clone()),
            SignerCandidate::Passphrase { key_id } => KeyReference::Passphrase { key_id: *key_id },
        };

        let handle = self.effects.secrets.unlock(&reference).await?;
        if handle.key_id() != candidate.key_id() {
            return Err(KeyfamError::crypto(format!(
                "unlocked key {} does not match signer {}",
                handle.key_id().short(),
                candidate.key_id().short()
            )));
        }
        tracing::debug!(signer = %reference, "Unlocked signer");
        Ok(Authorization::Local { candidate, handle })
    }

    async fn sign(
        &self,
        identity: &Identity,
        device: &DeviceIdentity,
        family: &KeyFamily,
        authorization: Authorization,
        new_key: &DeviceSigningKey,
        cancel: &CancelToken,
    ) -> Result<KeyEntry> {
        let kind = KeyKind::Device {
            device_id: device.id(),
            name: device.name().to_string(),
        };
        let public_key = new_key.public_key();

        let (candidate, role, statement, signature) = match authorization {
            Authorization::Eldest => {
                let statement = BindingStatement::eldest(identity, kind.clone(), &public_key);
                let signature = new_key.sign(&statement.to_bytes()?);
                (None, KeyRole::Eldest, statement, signature)
            }
            Authorization::Local { candidate, handle } => {
                let statement =
                    sibkey_statement(identity, family, kind.clone(), new_key, candidate.key_id())?;
                let signature = handle.sign(&statement.to_bytes()?);
                (Some(candidate), KeyRole::Sibkey, statement, signature)
            }
            Authorization::Remote {
                candidate,
                device_id,
                channel,
            } => {
                let statement =
                    sibkey_statement(identity, family, kind.clone(), new_key, candidate.key_id())?;
                let signature = self
                    .await_remote_signature(channel.as_ref(), device_id, &statement, cancel)
                    .await?;
                (Some(candidate), KeyRole::Sibkey, statement, signature)
            }
        };

        let message = statement.to_bytes()?;
        let signer_key = match &candidate {
            None => public_key,
            Some(candidate) => {
                family
                    .entry(&candidate.key_id())
                    .ok_or_else(|| {
                        KeyfamError::integrity(format!(
                            "signer {} is not in the key family",
                            candidate.key_id().short()
                        ))
                    })?
                    .public_key
            }
        };
        signer_key
            .verify_strict(&message, &signature)
            .map_err(|_| KeyfamError::crypto("signer produced an invalid binding signature"))?;

        let reverse_signature = match role {
            KeyRole::Sibkey => {
                let reverse = new_key.sign(&message);
                public_key.verify_strict(&message, &reverse)?;
                Some(reverse)
            }
            _ => None,
        };

        Ok(KeyEntry {
            public_key,
            role,
            kind,
            signer: statement.signer,
            signature,
            reverse_signature,
            revoked: false,
            synced_secret: false,
        })
    }

    async fn await_remote_signature(
        &self,
        channel: &dyn KeyExchangeChannel,
        signer: DeviceId,
        statement: &BindingStatement,
        cancel: &CancelToken,
    ) -> Result<Signature> {
        let decision = self.effects.decision.as_ref();
        decision
            .kex_status(KexStatus::Requested { device_id: signer })
            .await?;

        // Cancellation is polled first so an already-cancelled token always wins.
        let timeout = self.config.kex_timeout();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(KeyfamError::signer_cancelled(format!(
                "wait for device {signer} was cancelled"
            ))),
            result = tokio::time::timeout(timeout, channel.request_signature(signer, statement)) => {
                match result {
                    Ok(signed) => signed,
                    Err(_) => Err(KeyfamError::signer_timeout(format!(
                        "device {signer} did not sign within {}s",
                        timeout.as_secs()
                    ))),
                }
            }
        };

        match &outcome {
            Ok(_) => {
                decision
                    .kex_status(KexStatus::Signed { device_id: signer })
                    .await?
            }
            Err(error) => {
                let status = KexStatus::Abandoned {
                    device_id: signer,
                    reason: error.to_string(),
                };
                if let Err(status_error) = decision.kex_status(status).await {
                    tracing::debug!(%status_error, "Could not report abandoned key exchange");
                }
            }
        }
        outcome
    }
}

fn sibkey_statement(
    identity: &Identity,
    family: &KeyFamily,
    kind: KeyKind,
    new_key: &DeviceSigningKey,
    signer: KeyId,
) -> Result<BindingStatement> {
    let eldest = family
        .eldest_id()
        .ok_or_else(|| KeyfamError::integrity("cannot add a sibkey to a family without eldest"))?;
    Ok(BindingStatement::new(
        identity,
        KeyRole::Sibkey,
        kind,
        &new_key.public_key(),
        signer,
        eldest,
    ))
}
