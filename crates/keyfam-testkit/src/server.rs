//! In-memory identity server
//!
//! Authenticates users, serves key family snapshots and accepts submissions
//! after verifying that the extended chain is still valid. A fault switch
//! makes it acknowledge submissions without recording them, which exercises
//! the engine's verify-after-submit path.

use crate::family::FamilyBuilder;
use async_trait::async_trait;
use keyfam_core::effects::{IdentityService, KeyFamilyStore, ProvisioningResult, SubmitAck};
use keyfam_core::{
    Identity, KeyEntry, KeyFamily, KeyFamilySnapshot, KeyfamError, Result, UserId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
struct Account {
    identity: Identity,
    passphrase: String,
    entries: Vec<KeyEntry>,
}

/// Identity service and key family store backed by memory
#[derive(Debug, Default)]
pub struct MemoryIdentityServer {
    accounts: Mutex<HashMap<UserId, Account>>,
    drop_submissions: AtomicBool,
    submits: AtomicUsize,
    loads: AtomicUsize,
}

impl MemoryIdentityServer {
    /// Create an empty server
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with existing entries
    pub fn register(&self, identity: Identity, passphrase: &str, entries: Vec<KeyEntry>) {
        self.accounts.lock().insert(
            identity.user_id,
            Account {
                identity,
                passphrase: passphrase.to_string(),
                entries,
            },
        );
    }

    /// Register the account a builder describes
    pub fn register_family(&self, builder: &FamilyBuilder, passphrase: &str) {
        self.register(
            builder.identity().clone(),
            passphrase,
            builder.entries().to_vec(),
        );
    }

    /// Acknowledge but discard every later submission
    pub fn set_drop_submissions(&self, drop: bool) {
        self.drop_submissions.store(drop, Ordering::SeqCst);
    }

    /// Entries currently stored for a user
    pub fn entries(&self, user: UserId) -> Vec<KeyEntry> {
        self.accounts
            .lock()
            .get(&user)
            .map(|account| account.entries.clone())
            .unwrap_or_default()
    }

    /// Verified family currently stored for a user
    pub fn family(&self, identity: &Identity) -> KeyFamily {
        KeyFamily::from_snapshot(KeyFamilySnapshot {
            identity: identity.clone(),
            entries: self.entries(identity.user_id),
        })
        .expect("server holds an invalid chain")
    }

    /// Number of submissions received, accepted or not
    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    /// Number of snapshot loads served
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityService for MemoryIdentityServer {
    async fn authenticate(&self, username: &str, passphrase: &str) -> Result<Identity> {
        let accounts = self.accounts.lock();
        let account = accounts
            .values()
            .find(|account| account.identity.username == username)
            .ok_or_else(|| KeyfamError::authentication(format!("unknown user {username}")))?;
        if account.passphrase != passphrase {
            return Err(KeyfamError::authentication("bad passphrase"));
        }
        Ok(account.identity.clone())
    }
}

#[async_trait]
impl KeyFamilyStore for MemoryIdentityServer {
    async fn load(&self, identity: &Identity) -> Result<KeyFamilySnapshot> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock();
        let account = accounts
            .get(&identity.user_id)
            .ok_or_else(|| KeyfamError::not_found(format!("no account for {}", identity.user_id)))?;
        Ok(KeyFamilySnapshot {
            identity: account.identity.clone(),
            entries: account.entries.clone(),
        })
    }

    async fn submit(&self, result: ProvisioningResult) -> Result<SubmitAck> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock();
        let account = accounts.get_mut(&result.identity.user_id).ok_or_else(|| {
            KeyfamError::not_found(format!("no account for {}", result.identity.user_id))
        })?;

        let key_id = result.key_id();
        let mut entries = account.entries.clone();
        entries.push(result.entry);
        KeyFamily::from_snapshot(KeyFamilySnapshot {
            identity: account.identity.clone(),
            entries: entries.clone(),
        })?;

        let seqno = entries.len() as u64;
        if self.drop_submissions.load(Ordering::SeqCst) {
            tracing::warn!(key = %key_id.short(), "Dropping accepted submission");
        } else {
            account.entries = entries;
        }
        Ok(SubmitAck { key_id, seqno })
    }
}

