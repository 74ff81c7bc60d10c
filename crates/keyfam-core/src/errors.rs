//! Unified error system for keyfam
//!
//! A single error type covers the whole login and provisioning flow. Every
//! stage surfaces its error unmodified, so the variant tells the caller what
//! kind of retry (if any) makes sense.

use serde::{Deserialize, Serialize};

/// Unified error type for all keyfam operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum KeyfamError {
    /// Credentials were rejected by the identity service
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Why the credentials were rejected
        message: String,
    },

    /// Identity or key family unknown to the store
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// Key family signature chain is broken
    #[error("Key family integrity violation: {message}")]
    Integrity {
        /// Which chain rule was violated
        message: String,
    },

    /// No existing credential can authorize the new device key
    #[error("No signer available: {message}")]
    NoSignerAvailable {
        /// Which signer categories were tried
        message: String,
    },

    /// The decision capability aborted signer selection
    #[error("Signer selection aborted")]
    SelectionAborted,

    /// The decision capability returned a choice that cannot be resolved
    #[error("Invalid signer selection: {message}")]
    InvalidSelection {
        /// What was wrong with the choice
        message: String,
    },

    /// The secret provider could not unlock the key
    #[error("Wrong secret for {key}")]
    WrongSecret {
        /// Key reference that failed to unlock
        key: String,
    },

    /// The remote device never produced a signature
    #[error("Signer timed out: {message}")]
    SignerTimeout {
        /// Whether the wait was cancelled rather than timed out
        cancelled: bool,
        /// Description of the wait that ended
        message: String,
    },

    /// The store accepted the submission but the reloaded family disagrees
    #[error("Provisioning incomplete: {message}")]
    ProvisioningIncomplete {
        /// Observed state after reload
        message: String,
    },

    /// Another provisioning attempt holds the identity+device slot
    #[error("Provisioning already in progress for {user} on {device}")]
    AlreadyInProgress {
        /// Username of the attempt in flight
        user: String,
        /// Device of the attempt in flight
        device: String,
    },

    /// A session for a different user is still active
    #[error("Already logged in as {username}")]
    AlreadyLoggedIn {
        /// User currently holding the session
        username: String,
    },

    /// Cryptographic operation failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Collaborator storage or transport failure
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Invalid input
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },
}

impl KeyfamError {
    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Create a no-signer error
    pub fn no_signer(message: impl Into<String>) -> Self {
        Self::NoSignerAvailable {
            message: message.into(),
        }
    }

    /// Create an invalid selection error
    pub fn invalid_selection(message: impl Into<String>) -> Self {
        Self::InvalidSelection {
            message: message.into(),
        }
    }

    /// Create a wrong secret error
    pub fn wrong_secret(key: impl Into<String>) -> Self {
        Self::WrongSecret { key: key.into() }
    }

    /// Create a signer timeout error for an elapsed deadline
    pub fn signer_timeout(message: impl Into<String>) -> Self {
        Self::SignerTimeout {
            cancelled: false,
            message: message.into(),
        }
    }

    /// Create a signer timeout error for a cancelled wait
    pub fn signer_cancelled(message: impl Into<String>) -> Self {
        Self::SignerTimeout {
            cancelled: true,
            message: message.into(),
        }
    }

    /// Create a provisioning incomplete error
    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::ProvisioningIncomplete {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Whether a fresh caller-initiated attempt can reasonably succeed
    /// without changing the account.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WrongSecret { .. }
                | Self::SignerTimeout { .. }
                | Self::ProvisioningIncomplete { .. }
                | Self::AlreadyInProgress { .. }
                | Self::Storage { .. }
        )
    }

    /// Whether the login attempt must stop without any retry
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::NotFound { .. } | Self::Integrity { .. }
        )
    }
}

/// Standard Result type for keyfam operations
pub type Result<T> = std::result::Result<T, KeyfamError>;

impl From<std::io::Error> for KeyfamError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for KeyfamError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(format!("serialization: {err}"))
    }
}

impl From<toml::de::Error> for KeyfamError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for KeyfamError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        Self::crypto(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeyfamError::no_signer("no device, no pgp key");
        assert_eq!(err.to_string(), "No signer available: no device, no pgp key");
    }

    #[test]
    fn test_retry_classification() {
        assert!(KeyfamError::wrong_secret("pgp:abcd").is_retryable());
        assert!(KeyfamError::signer_cancelled("kex").is_retryable());
        assert!(KeyfamError::incomplete("no sibkey").is_retryable());
        assert!(!KeyfamError::SelectionAborted.is_retryable());
        assert!(KeyfamError::authentication("bad passphrase").is_fatal());
        assert!(KeyfamError::integrity("bad chain").is_fatal());
        assert!(!KeyfamError::no_signer("none").is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        assert!(matches!(
            KeyfamError::from(io_err),
            KeyfamError::NotFound { .. }
        ));
    }
}
