//! Login sessions and requests

use keyfam_core::{DeviceIdentity, Identity, KeyId};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Credentials and options of one login call
pub struct LoginRequest {
    /// Account to log in to
    pub username: String,
    passphrase: Zeroizing<String>,
    /// Re-authenticate even when a session for the user exists, and replace a
    /// session held by another user
    pub force: bool,
}

impl LoginRequest {
    /// Request without `force`
    pub fn new(username: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            passphrase: Zeroizing::new(passphrase.into()),
            force: false,
        }
    }

    /// Set the `force` flag
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// The passphrase; scrubbed when the request is dropped
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("passphrase", &"<redacted>")
            .field("force", &self.force)
            .finish()
    }
}

/// An authenticated user on a provisioned device
///
/// Only constructed once the device holds an active key in the user's family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: Uuid,
    identity: Identity,
    device: DeviceIdentity,
    device_key: KeyId,
    established_at: OffsetDateTime,
}

impl Session {
    pub(crate) fn establish(identity: Identity, device: DeviceIdentity, device_key: KeyId) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            identity,
            device,
            device_key,
            established_at: OffsetDateTime::now_utc(),
        };
        tracing::info!(
            session = %session.id,
            user = %session.identity.username,
            device = %session.device.id(),
            key = %device_key.short(),
            "Session established"
        );
        session
    }

    /// Unique id of this session
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The logged-in user
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Username of the logged-in user
    pub fn username(&self) -> &str {
        &self.identity.username
    }

    /// The local device
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// The device's active key at login time
    pub fn device_key(&self) -> KeyId {
        self.device_key
    }

    /// When the session was established
    pub fn established_at(&self) -> OffsetDateTime {
        self.established_at
    }

    /// End the session
    pub fn logout(self) {
        tracing::info!(session = %self.id, user = %self.identity.username, "Logged out");
    }
}
