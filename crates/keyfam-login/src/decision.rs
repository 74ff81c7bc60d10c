//! Composable signer decision handlers

use async_trait::async_trait;
use keyfam_core::effects::{
    KexStatus, PgpKeyRef, SelectSignerResponse, SignerCandidate, SignerDecision,
};
use keyfam_core::{LoginConfig, Result};

/// Decorator that answers signer selection with a PGP key when one is offered
///
/// Picks the candidate matching the preferred fingerprint, else the first PGP
/// candidate. Without a PGP candidate, and for every other capability method,
/// the wrapped handler answers.
#[derive(Debug, Clone)]
pub struct PreferPgpSigner<D> {
    inner: D,
    fingerprint: Option<String>,
}

impl<D: SignerDecision> PreferPgpSigner<D> {
    /// Wrap a decision handler
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            fingerprint: None,
        }
    }

    /// Prefer a specific key among several PGP candidates
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Wrap a handler using the configured preferred fingerprint
    pub fn from_config(inner: D, config: &LoginConfig) -> Self {
        Self {
            inner,
            fingerprint: config.preferred_pgp_fingerprint.clone(),
        }
    }

    /// The wrapped handler
    pub fn inner(&self) -> &D {
        &self.inner
    }

    fn pick<'c>(&self, candidates: &'c [SignerCandidate]) -> Option<&'c SignerCandidate> {
        let mut pgp = candidates
            .iter()
            .filter(|candidate| matches!(candidate, SignerCandidate::Pgp(_)));

        if let Some(wanted) = &self.fingerprint {
            let preferred = candidates.iter().find(|candidate| match candidate {
                SignerCandidate::Pgp(key) => key.fingerprint.eq_ignore_ascii_case(wanted),
                _ => false,
            });
            if preferred.is_some() {
                return preferred;
            }
        }
        pgp.next()
    }
}

#[async_trait]
impl<D: SignerDecision> SignerDecision for PreferPgpSigner<D> {
    async fn select_signer(&self, candidates: &[SignerCandidate]) -> Result<SelectSignerResponse> {
        match self.pick(candidates) {
            Some(candidate) => {
                tracing::debug!(signer = %candidate, "Preferring PGP signer");
                Ok(SelectSignerResponse::sign_with(candidate.clone()))
            }
            None => self.inner.select_signer(candidates).await,
        }
    }

    async fn confirm_remote_fetch(&self, keys: &[PgpKeyRef]) -> Result<bool> {
        self.inner.confirm_remote_fetch(keys).await
    }

    async fn display_secret_words(&self, words: &[String]) -> Result<()> {
        self.inner.display_secret_words(words).await
    }

    async fn kex_status(&self, status: KexStatus) -> Result<()> {
        self.inner.kex_status(status).await
    }
}

/// Handler for unattended logins
///
/// Accepts a lone candidate and aborts when a real choice would be needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractiveDecision;

#[async_trait]
impl SignerDecision for NonInteractiveDecision {
    async fn select_signer(&self, candidates: &[SignerCandidate]) -> Result<SelectSignerResponse> {
        if candidates.len() == 1 {
            Ok(SelectSignerResponse::accept())
        } else {
            tracing::warn!(
                candidates = candidates.len(),
                "Signer choice needs a user; aborting"
            );
            Ok(SelectSignerResponse::abort())
        }
    }
}
