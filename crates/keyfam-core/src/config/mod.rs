//! Login configuration
//!
//! Loaded from TOML, overridden by `KEYFAM_*` environment variables, then
//! validated before the orchestrator is built.
//!
//! ```toml
//! device_name = "work laptop"
//! kex_timeout_secs = 120
//! remote_keyring_fetch = true
//! preferred_pgp_fingerprint = "9F3C0D1E..."
//! ```

mod traits;

pub use traits::KeyfamConfig;

use crate::types::validate_device_name;
use crate::{KeyfamError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default wait for a remote device to approve a new key
pub const DEFAULT_KEX_TIMEOUT_SECS: u64 = 300;

/// Upper bound on the key-exchange wait
pub const MAX_KEX_TIMEOUT_SECS: u64 = 3600;

/// Configuration of the login orchestrator and provisioning engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginConfig {
    /// Name registered for this device; prompted for when absent
    pub device_name: Option<String>,
    /// Seconds to wait for a remote device to sign
    pub kex_timeout_secs: u64,
    /// Allow fetching PGP private material from an external keyring
    pub remote_keyring_fetch: bool,
    /// PGP fingerprint preferred by scripted signer selection
    pub preferred_pgp_fingerprint: Option<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            kex_timeout_secs: DEFAULT_KEX_TIMEOUT_SECS,
            remote_keyring_fetch: true,
            preferred_pgp_fingerprint: None,
        }
    }
}

impl LoginConfig {
    /// Key-exchange wait as a `Duration`
    pub fn kex_timeout(&self) -> Duration {
        Duration::from_secs(self.kex_timeout_secs)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl KeyfamConfig for LoginConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeyfamError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    fn merge_with(&mut self, other: &Self) -> Result<()> {
        let defaults = Self::default();
        if other.device_name.is_some() {
            self.device_name.clone_from(&other.device_name);
        }
        if other.kex_timeout_secs != defaults.kex_timeout_secs {
            self.kex_timeout_secs = other.kex_timeout_secs;
        }
        if other.remote_keyring_fetch != defaults.remote_keyring_fetch {
            self.remote_keyring_fetch = other.remote_keyring_fetch;
        }
        if other.preferred_pgp_fingerprint.is_some() {
            self.preferred_pgp_fingerprint
                .clone_from(&other.preferred_pgp_fingerprint);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.kex_timeout_secs == 0 {
            return Err(KeyfamError::config("kex_timeout_secs must be positive"));
        }
        if self.kex_timeout_secs > MAX_KEX_TIMEOUT_SECS {
            return Err(KeyfamError::config(format!(
                "kex_timeout_secs must be at most {MAX_KEX_TIMEOUT_SECS}"
            )));
        }
        if let Some(name) = &self.device_name {
            validate_device_name(name).map_err(|e| KeyfamError::config(e.to_string()))?;
        }
        if let Some(fingerprint) = &self.preferred_pgp_fingerprint {
            if fingerprint.is_empty() || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(KeyfamError::config(
                    "preferred_pgp_fingerprint must be hex",
                ));
            }
        }
        Ok(())
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "device_name" => self.device_name = Some(value.to_string()),
            "kex_timeout_secs" => {
                self.kex_timeout_secs = value.parse().map_err(|e| {
                    KeyfamError::config(format!("kex_timeout_secs {value:?}: {e}"))
                })?;
            }
            "remote_keyring_fetch" => {
                self.remote_keyring_fetch = value.parse().map_err(|e| {
                    KeyfamError::config(format!("remote_keyring_fetch {value:?}: {e}"))
                })?;
            }
            "preferred_pgp_fingerprint" => {
                self.preferred_pgp_fingerprint = Some(value.to_uppercase());
            }
            // Other KEYFAM_* variables belong to other components.
            _ => tracing::trace!(key, "Ignoring unknown login config key"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = LoginConfig::defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.kex_timeout(), Duration::from_secs(DEFAULT_KEX_TIMEOUT_SECS));
        assert!(config.remote_keyring_fetch);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "device_name = \"work laptop\"\nkex_timeout_secs = 45\nremote_keyring_fetch = false"
        )
        .unwrap();

        let config = LoginConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.device_name.as_deref(), Some("work laptop"));
        assert_eq!(config.kex_timeout_secs, 45);
        assert!(!config.remote_keyring_fetch);
        assert!(config.preferred_pgp_fingerprint.is_none());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = LoginConfig::from_toml("kex_timeout = 5");
        assert_matches!(result, Err(KeyfamError::Config { .. }));
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = LoginConfig {
            kex_timeout_secs: 0,
            ..LoginConfig::default()
        };
        assert!(config.validate().is_err());

        config.kex_timeout_secs = MAX_KEX_TIMEOUT_SECS + 1;
        assert!(config.validate().is_err());

        config.kex_timeout_secs = 60;
        config.device_name = Some("   ".into());
        assert!(config.validate().is_err());

        config.device_name = Some("phone".into());
        config.preferred_pgp_fingerprint = Some("not hex!".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_prefers_explicit_values() {
        let mut base = LoginConfig {
            device_name: Some("desk".into()),
            ..LoginConfig::default()
        };
        let overlay = LoginConfig {
            kex_timeout_secs: 30,
            remote_keyring_fetch: false,
            ..LoginConfig::default()
        };
        base.merge_with(&overlay).unwrap();
        assert_eq!(base.device_name.as_deref(), Some("desk"));
        assert_eq!(base.kex_timeout_secs, 30);
        assert!(!base.remote_keyring_fetch);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("KEYFAM_KEX_TIMEOUT_SECS", "90");
        std::env::set_var("KEYFAM_DEVICE_NAME", "ci runner");
        let mut config = LoginConfig::default();
        let result = config.merge_with_env();
        std::env::remove_var("KEYFAM_KEX_TIMEOUT_SECS");
        std::env::remove_var("KEYFAM_DEVICE_NAME");

        result.unwrap();
        assert_eq!(config.kex_timeout_secs, 90);
        assert_eq!(config.device_name.as_deref(), Some("ci runner"));
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_garbage() {
        std::env::set_var("KEYFAM_REMOTE_KEYRING_FETCH", "sometimes");
        let mut config = LoginConfig::default();
        let result = config.merge_with_env();
        std::env::remove_var("KEYFAM_REMOTE_KEYRING_FETCH");
        assert_matches!(result, Err(KeyfamError::Config { .. }));
    }
}
