//! Core configuration traits

use crate::KeyfamError;
use std::path::Path;

/// Contract shared by keyfam configuration types
pub trait KeyfamConfig: Clone + Default + Send + Sync + 'static {
    /// Prefix of environment variables that override file values
    const ENV_PREFIX: &'static str = "KEYFAM_";

    /// Get default configuration values
    fn defaults() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> Result<Self, KeyfamError>;

    /// Merge with environment variables
    fn merge_with_env(&mut self) -> Result<(), KeyfamError> {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix(Self::ENV_PREFIX) {
                self.set_from_string(&config_key.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Merge with another configuration; values set in `other` win
    fn merge_with(&mut self, other: &Self) -> Result<(), KeyfamError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), KeyfamError>;

    /// Set a configuration value from a string (env vars, CLI overrides)
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), KeyfamError>;
}
