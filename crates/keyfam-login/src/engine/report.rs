//! Stages and reports of a provisioning attempt

use crate::classifier::ProvisioningState;
use keyfam_core::effects::SignerCandidate;
use keyfam_core::{DeviceId, KeyId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the provisioning state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Load the key family
    Start,
    /// Classify the device against the family
    Classify,
    /// Choose the signer of the new key
    SelectSigner,
    /// Unlock the signer or prepare the key exchange
    Authorize,
    /// Create the new key pair
    GenerateKey,
    /// Sign the binding statement and seal the new key
    Sign,
    /// Append the entry to the store
    Submit,
    /// Reload and re-classify
    Verify,
    /// The device holds an active key
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Start => "start",
            Stage::Classify => "classify",
            Stage::SelectSigner => "select_signer",
            Stage::Authorize => "authorize",
            Stage::GenerateKey => "generate_key",
            Stage::Sign => "sign",
            Stage::Submit => "submit",
            Stage::Verify => "verify",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

/// Stages entered so far, in order
#[derive(Debug, Clone, Default)]
pub(crate) struct StageTrace {
    stages: Vec<Stage>,
}

impl StageTrace {
    pub(crate) fn enter(&mut self, stage: Stage) {
        tracing::debug!(%stage, "Entering provisioning stage");
        self.stages.push(stage);
    }

    pub(crate) fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Start)
    }

    pub(crate) fn stages(&self) -> Vec<Stage> {
        self.stages.clone()
    }
}

/// How a successful attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningOutcome {
    /// The device already held an active key; nothing was generated
    AlreadyProvisioned {
        /// The device's active key
        key_id: KeyId,
    },
    /// A new key was generated, signed, submitted and observed
    Provisioned {
        /// The device's active key after reload
        key_id: KeyId,
        /// Key that was submitted in this attempt
        submitted: KeyId,
        /// Signer of the new key; `None` when it became the eldest key
        signer: Option<SignerCandidate>,
        /// Position the store assigned to the entry
        seqno: u64,
    },
}

/// Summary of a successful provisioning attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningReport {
    /// Device that was provisioned
    pub device_id: DeviceId,
    /// Classification at the start of the attempt
    pub state_before: ProvisioningState,
    /// How the attempt ended
    pub outcome: ProvisioningOutcome,
    /// Stages visited, in order
    pub stages: Vec<Stage>,
}

impl ProvisioningReport {
    /// The device's active key
    pub fn key_id(&self) -> KeyId {
        match &self.outcome {
            ProvisioningOutcome::AlreadyProvisioned { key_id }
            | ProvisioningOutcome::Provisioned { key_id, .. } => *key_id,
        }
    }

    /// Whether a new key was registered
    pub fn was_provisioned(&self) -> bool {
        matches!(self.outcome, ProvisioningOutcome::Provisioned { .. })
    }

    /// Signer of the new key, if one was needed
    pub fn signer(&self) -> Option<&SignerCandidate> {
        match &self.outcome {
            ProvisioningOutcome::Provisioned { signer, .. } => signer.as_ref(),
            ProvisioningOutcome::AlreadyProvisioned { .. } => None,
        }
    }
}
