//! Identity service effect

use crate::types::Identity;
use crate::Result;
use async_trait::async_trait;

/// Credential check against the identity server
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Authenticate a username and passphrase
    ///
    /// Fails with `Authentication` when the credentials are rejected.
    async fn authenticate(&self, username: &str, passphrase: &str) -> Result<Identity>;
}
