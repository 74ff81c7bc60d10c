//! Signer selection
//!
//! Candidates are gathered one category at a time, in a fixed priority
//! order, and only the first non-empty category is presented to the
//! decision capability:
//!
//! 1. Other devices of the user, when a key-exchange channel exists
//! 2. The passphrase-derived key
//! 3. PGP keys whose private half is synced with the account
//! 4. PGP keys found in a local keyring
//! 5. PGP keys fetched from an external keyring, after confirmation
//!
//! The decision capability is consulted exactly once per selection.

mod resolve;

pub use resolve::resolve;

use keyfam_core::effects::{
    PgpKeyRef, PgpKeyring, PgpOrigin, PgpPublicKey, SignerCandidate, SignerDecision,
};
use keyfam_core::{ComputedKeyFamily, DeviceIdentity, KeyEntry, KeyKind, KeyfamError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category a candidate set was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerCategory {
    /// Other provisioned devices
    Device,
    /// Passphrase-derived key
    Passphrase,
    /// PGP keys synced with the account
    SyncedPgp,
    /// PGP keys in a local keyring
    KeyringPgp,
    /// PGP keys fetched from an external keyring
    RemotePgp,
}

impl fmt::Display for SignerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignerCategory::Device => "device",
            SignerCategory::Passphrase => "passphrase",
            SignerCategory::SyncedPgp => "synced_pgp",
            SignerCategory::KeyringPgp => "keyring_pgp",
            SignerCategory::RemotePgp => "remote_pgp",
        };
        f.write_str(label)
    }
}

/// Non-empty set of candidates from a single category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    /// Category the candidates belong to
    pub category: SignerCategory,
    /// Candidates in family order
    pub candidates: Vec<SignerCandidate>,
}

/// Chooses which existing credential signs a new device key
pub struct SignerSelector<'a> {
    decision: &'a dyn SignerDecision,
    keyring: &'a dyn PgpKeyring,
    kex_available: bool,
    remote_fetch: bool,
}

impl<'a> SignerSelector<'a> {
    /// Create a selector with no key-exchange channel and remote fetch enabled
    pub fn new(decision: &'a dyn SignerDecision, keyring: &'a dyn PgpKeyring) -> Self {
        Self {
            decision,
            keyring,
            kex_available: false,
            remote_fetch: true,
        }
    }

    /// Whether other devices can be reached to sign
    pub fn with_key_exchange(mut self, available: bool) -> Self {
        self.kex_available = available;
        self
    }

    /// Whether public-only PGP keys may be fetched from an external keyring
    pub fn with_remote_fetch(mut self, enabled: bool) -> Self {
        self.remote_fetch = enabled;
        self
    }

    /// Gather candidates, consult the decision capability and resolve its answer
    pub async fn select(
        &self,
        computed: &ComputedKeyFamily<'_>,
        device: &DeviceIdentity,
    ) -> Result<SignerCandidate> {
        let set = self.gather(computed, device).await?;
        tracing::debug!(
            category = %set.category,
            candidates = set.candidates.len(),
            "Presenting signer candidates"
        );

        let response = self.decision.select_signer(&set.candidates).await?;
        let chosen = resolve(&set.candidates, response)?;
        tracing::info!(signer = %chosen, "Signer selected");
        Ok(chosen)
    }

    /// Highest-priority non-empty candidate category
    ///
    /// Fails with `NoSignerAvailable` when every category is empty.
    pub async fn gather(
        &self,
        computed: &ComputedKeyFamily<'_>,
        device: &DeviceIdentity,
    ) -> Result<CandidateSet> {
        if self.kex_available {
            let devices: Vec<SignerCandidate> = computed
                .devices()
                .filter(|(device_id, _)| *device_id != device.id())
                .filter_map(|(device_id, entry)| match &entry.kind {
                    KeyKind::Device { name, .. } => Some(SignerCandidate::Device {
                        device_id,
                        name: name.clone(),
                        key_id: entry.key_id(),
                    }),
                    _ => None,
                })
                .collect();
            if !devices.is_empty() {
                return Ok(CandidateSet {
                    category: SignerCategory::Device,
                    candidates: devices,
                });
            }
        }

        let passphrase: Vec<SignerCandidate> = computed
            .active_passphrase_keys()
            .into_iter()
            .map(|entry| SignerCandidate::Passphrase {
                key_id: entry.key_id(),
            })
            .collect();
        if !passphrase.is_empty() {
            return Ok(CandidateSet {
                category: SignerCategory::Passphrase,
                candidates: passphrase,
            });
        }

        let pgp_entries = computed.active_pgp_keys();
        let synced: Vec<SignerCandidate> = pgp_entries
            .iter()
            .filter(|entry| entry.synced_secret)
            .filter_map(|entry| pgp_public_key(entry))
            .map(|key| SignerCandidate::Pgp(key_ref(key, PgpOrigin::LocalSynced)))
            .collect();
        if !synced.is_empty() {
            return Ok(CandidateSet {
                category: SignerCategory::SyncedPgp,
                candidates: synced,
            });
        }

        let registered: Vec<PgpPublicKey> = pgp_entries
            .iter()
            .filter_map(|entry| pgp_public_key(entry))
            .collect();
        if registered.is_empty() {
            return Err(KeyfamError::no_signer(
                "no other device, passphrase key or PGP key can sign",
            ));
        }

        let local = self.keyring_matches(&registered, PgpOrigin::LocalKeyring).await?;
        if !local.is_empty() {
            return Ok(CandidateSet {
                category: SignerCategory::KeyringPgp,
                candidates: local,
            });
        }

        self.fetch_remote(&registered).await
    }

    async fn fetch_remote(&self, registered: &[PgpPublicKey]) -> Result<CandidateSet> {
        if !self.remote_fetch {
            return Err(KeyfamError::no_signer(
                "PGP keys are public-only here and remote keyring fetch is disabled",
            ));
        }

        let proposed: Vec<PgpKeyRef> = registered
            .iter()
            .cloned()
            .map(|key| key_ref(key, PgpOrigin::RemoteKeyring))
            .collect();
        if !self.decision.confirm_remote_fetch(&proposed).await? {
            return Err(KeyfamError::no_signer("remote keyring fetch declined"));
        }

        let mut fetched = 0usize;
        for key in registered {
            match self.keyring.fetch_from_remote_store(key).await {
                Ok(_) => fetched += 1,
                Err(error) => tracing::warn!(
                    fingerprint = %key.fingerprint,
                    %error,
                    "Remote keyring fetch failed"
                ),
            }
        }
        tracing::debug!(fetched, requested = registered.len(), "Remote keyring fetch done");
        if fetched == 0 {
            return Err(KeyfamError::no_signer(
                "no registered PGP key could be fetched from a remote keyring",
            ));
        }

        let candidates = self.keyring_matches(registered, PgpOrigin::RemoteKeyring).await?;
        if candidates.is_empty() {
            return Err(KeyfamError::no_signer(
                "fetched PGP keys did not appear in the local keyring",
            ));
        }
        Ok(CandidateSet {
            category: SignerCategory::RemotePgp,
            candidates,
        })
    }

    async fn keyring_matches(
        &self,
        registered: &[PgpPublicKey],
        origin: PgpOrigin,
    ) -> Result<Vec<SignerCandidate>> {
        let mut matches: Vec<SignerCandidate> = Vec::new();
        for found in self.keyring.list_matching_keys(registered).await? {
            if !registered.iter().any(|key| key.key_id == found.key_id) {
                tracing::debug!(fingerprint = %found.fingerprint, "Ignoring unregistered keyring key");
                continue;
            }
            let candidate = SignerCandidate::Pgp(PgpKeyRef { origin, ..found });
            if !matches.iter().any(|known| known.same_signer(&candidate)) {
                matches.push(candidate);
            }
        }
        Ok(matches)
    }
}

fn pgp_public_key(entry: &KeyEntry) -> Option<PgpPublicKey> {
    match &entry.kind {
        KeyKind::Pgp { fingerprint } => Some(PgpPublicKey {
            key_id: entry.key_id(),
            fingerprint: fingerprint.clone(),
        }),
        _ => None,
    }
}

fn key_ref(key: PgpPublicKey, origin: PgpOrigin) -> PgpKeyRef {
    PgpKeyRef {
        key_id: key.key_id,
        fingerprint: key.fingerprint,
        origin,
    }
}
