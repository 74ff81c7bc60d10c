//! Login orchestration
//!
//! Authenticates the user, classifies the local device against the user's
//! key family and runs provisioning when the device has no active key. A
//! session is returned only for a provisioned device.

use crate::classifier::ProvisioningState;
use crate::effects::LoginEffects;
use crate::engine::{CancelToken, DeviceProvisioner, InFlightRegistry};
use crate::session::{LoginRequest, Session};
use keyfam_core::key_family;
use keyfam_core::{
    DeviceId, DeviceIdentity, Identity, KeyFamily, KeyKind, KeyfamConfig, KeyfamError,
    LoginConfig, Result,
};

/// Entry point for logging a user in on this device
#[derive(Debug, Clone)]
pub struct LoginOrchestrator {
    effects: LoginEffects,
    config: LoginConfig,
    device_id: DeviceId,
    provisioner: DeviceProvisioner,
}

impl LoginOrchestrator {
    /// Build an orchestrator for the local device
    ///
    /// Fails with `Config` if the configuration does not validate.
    pub fn new(effects: LoginEffects, config: LoginConfig, device_id: DeviceId) -> Result<Self> {
        config.validate()?;
        let provisioner = DeviceProvisioner::new(effects.clone(), config.clone());
        Ok(Self {
            effects,
            config,
            device_id,
            provisioner,
        })
    }

    /// Share the in-flight registry with other orchestrators on this device
    ///
    /// Orchestrators sharing a registry reject concurrent provisioning of the
    /// same user and device with `AlreadyInProgress`.
    pub fn with_registry(mut self, registry: InFlightRegistry) -> Self {
        self.provisioner = self.provisioner.with_registry(registry);
        self
    }

    /// The local device
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Provisioning engine used by this orchestrator
    pub fn provisioner(&self) -> &DeviceProvisioner {
        &self.provisioner
    }

    /// Log in, provisioning the device if needed
    ///
    /// With a `current` session for the same user and no `force`, the device
    /// is re-checked without re-authenticating. A session of another user is
    /// only replaced with `force`.
    pub async fn login(&self, request: &LoginRequest, current: Option<&Session>) -> Result<Session> {
        self.login_with_cancel(request, current, &CancelToken::new())
            .await
    }

    /// [`login`](Self::login) with a cancellation token for key-exchange waits
    pub async fn login_with_cancel(
        &self,
        request: &LoginRequest,
        current: Option<&Session>,
        cancel: &CancelToken,
    ) -> Result<Session> {
        if let Some(session) = current {
            if session.username() != request.username {
                if !request.force {
                    return Err(KeyfamError::AlreadyLoggedIn {
                        username: session.username().to_string(),
                    });
                }
                tracing::info!(
                    from = %session.username(),
                    to = %request.username,
                    "Replacing session of another user"
                );
            } else if !request.force {
                if let Some(resumed) = self.resume(session).await? {
                    return Ok(resumed);
                }
            }
        }

        let identity = self
            .effects
            .identity
            .authenticate(&request.username, request.passphrase())
            .await?;
        tracing::info!(user = %identity.username, "Authenticated");

        let family = key_family::load(self.effects.store.as_ref(), &identity).await?;
        let device = self.device_identity(&family).await?;

        match ProvisioningState::of(&family, &device) {
            ProvisioningState::HasDeviceKey { key_id } => {
                Ok(Session::establish(identity, device, key_id))
            }
            state => {
                tracing::info!(
                    user = %identity.username,
                    device = %device.id(),
                    %state,
                    "Device needs a key"
                );
                let report = self
                    .provisioner
                    .provision_with_cancel(&identity, &device, cancel)
                    .await?;
                Ok(Session::establish(identity, device, report.key_id()))
            }
        }
    }

    /// Re-check an existing session's device; `None` if it lost its key
    async fn resume(&self, session: &Session) -> Result<Option<Session>> {
        let identity: &Identity = session.identity();
        let family = key_family::load(self.effects.store.as_ref(), identity).await?;
        match ProvisioningState::of(&family, session.device()) {
            ProvisioningState::HasDeviceKey { key_id } => Ok(Some(Session::establish(
                identity.clone(),
                session.device().clone(),
                key_id,
            ))),
            state => {
                tracing::info!(
                    user = %identity.username,
                    %state,
                    "Existing session's device has no active key; logging in again"
                );
                Ok(None)
            }
        }
    }

    /// Name of the local device
    ///
    /// A registered device keeps its registered name. Otherwise the
    /// configured name is used, else the user is prompted.
    async fn device_identity(&self, family: &KeyFamily) -> Result<DeviceIdentity> {
        let registered = family.computed().and_then(|computed| {
            computed
                .device_sibkey(self.device_id)
                .and_then(|entry| match &entry.kind {
                    KeyKind::Device { name, .. } => Some(name.clone()),
                    _ => None,
                })
        });

        let name = match (registered, &self.config.device_name) {
            (Some(name), _) => name,
            (None, Some(configured)) => configured.clone(),
            (None, None) => self.effects.prompter.prompt_device_name().await?,
        };
        DeviceIdentity::new(self.device_id, name)
    }
}
