//! User and device identities

use super::identifiers::{DeviceId, UserId};
use crate::{KeyfamError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted device name, in characters
pub const MAX_DEVICE_NAME_LEN: usize = 64;

/// A registered user: stable id plus username
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user identifier
    pub user_id: UserId,
    /// Login name
    pub username: String,
}

impl Identity {
    /// Create an identity
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.user_id)
    }
}

/// The local device: stable id and human-readable name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    id: DeviceId,
    name: String,
}

impl DeviceIdentity {
    /// Create a device identity, validating the name
    pub fn new(id: DeviceId, name: impl AsRef<str>) -> Result<Self> {
        let name = validate_device_name(name.as_ref())?;
        Ok(Self { id, name })
    }

    /// Device identifier
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Device name as registered
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Trim and check a device name, returning the normalized form
pub fn validate_device_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(KeyfamError::invalid("device name must not be empty"));
    }
    if trimmed.chars().count() > MAX_DEVICE_NAME_LEN {
        return Err(KeyfamError::invalid(format!(
            "device name longer than {MAX_DEVICE_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}
