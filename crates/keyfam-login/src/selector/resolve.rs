//! Resolution of the decision capability's answer

use keyfam_core::effects::{SelectSignerAction, SelectSignerResponse, SignerCandidate};
use keyfam_core::{KeyfamError, Result};

/// Turn a decision into the signer to use
///
/// An explicit choice must denote one of the presented candidates; the
/// presented candidate is returned so its origin is the one the selector saw.
/// Signing without a choice is only valid when exactly one candidate was
/// presented.
pub fn resolve(
    candidates: &[SignerCandidate],
    response: SelectSignerResponse,
) -> Result<SignerCandidate> {
    if response.action == SelectSignerAction::Abort {
        tracing::info!("Signer selection aborted");
        return Err(KeyfamError::SelectionAborted);
    }

    match response.chosen {
        Some(choice) => candidates
            .iter()
            .find(|candidate| candidate.same_signer(&choice))
            .cloned()
            .ok_or_else(|| KeyfamError::invalid_selection(format!("{choice} was not offered"))),
        None => match candidates {
            [only] => Ok(only.clone()),
            [] => Err(KeyfamError::invalid_selection("no candidate was offered")),
            many => Err(KeyfamError::invalid_selection(format!(
                "{} candidates offered and none chosen",
                many.len()
            ))),
        },
    }
}
