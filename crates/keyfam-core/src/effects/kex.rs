//! Device-to-device key exchange effect
//!
//! The channel asks an already-provisioned device to sign the new key's
//! binding statement. The call suspends until the remote user approves; the
//! caller is responsible for timeouts and cancellation.

use crate::key_family::BindingStatement;
use crate::types::DeviceId;
use crate::Result;
use async_trait::async_trait;
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};

/// Progress reported while waiting on the remote device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KexStatus {
    /// Request sent to the remote device
    Requested {
        /// Device asked to sign
        device_id: DeviceId,
    },
    /// Remote device returned a signature
    Signed {
        /// Device that signed
        device_id: DeviceId,
    },
    /// Waiting ended without a signature
    Abandoned {
        /// Device that was asked
        device_id: DeviceId,
        /// Why the wait ended
        reason: String,
    },
}

/// Channel to another device of the same user that can sign on its behalf
#[async_trait]
pub trait KeyExchangeChannel: Send + Sync {
    /// Ask `signer` to sign the binding statement of the new key
    async fn request_signature(
        &self,
        signer: DeviceId,
        statement: &BindingStatement,
    ) -> Result<Signature>;

    /// Words to display so the remote user can confirm the session
    fn secret_words(&self) -> Option<Vec<String>> {
        None
    }
}
