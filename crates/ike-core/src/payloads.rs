//! The two-pass payload verification algorithm (spec §4.5): once against
//! the cleartext payload set, once (if the message carries an `SK`/`SKF`)
//! against the payloads found inside it. Ported from `ikev2_verify_payloads`
//! in `ikev2_states.c`, minus the C version's side-table of which
//! notification number maps to which "problem description" string.

use ike_wire::{MessageDigest, NotifyMessageType, PayloadSet};
use thiserror::Error;

/// What a transition in the state table expects to see, on one side of the
/// secured boundary (`message_payloads`/`encrypted_payloads` in the
/// original).
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadRequirement {
    pub required: PayloadSet,
    pub optional: PayloadSet,
    /// If set, a message missing `required` payloads is acceptable *only*
    /// if it instead carries exactly this notification (e.g.
    /// `NO_PROPOSAL_CHOSEN` standing in for the full `SA`/`TSi`/`TSr` set).
    pub notification: Option<NotifyMessageType>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing required payload(s): {missing:?}")]
    MissingRequired { missing: PayloadSet },
    #[error("unexpected payload(s) present: {unexpected:?}")]
    Unexpected { unexpected: PayloadSet },
    #[error("payload repeated more than once where only one is allowed: {repeated:?}")]
    DisallowedRepeat { repeated: PayloadSet },
}

/// Check one half (clear or encrypted) of a message digest against what a
/// transition requires.
pub fn verify_half(
    present: PayloadSet,
    repeated: PayloadSet,
    req: &PayloadRequirement,
) -> Result<(), VerifyError> {
    let missing = req.required - present;
    if !missing.is_empty() {
        if let Some(expected_notify) = req.notification {
            if present.contains(PayloadSet::N) {
                // The caller is responsible for checking the actual
                // notification type matches `expected_notify`; this
                // function only confirms the shape is plausible.
                let _ = expected_notify;
                return Ok(());
            }
        }
        return Err(VerifyError::MissingRequired { missing });
    }

    let allowed = req.required | req.optional | PayloadSet::EVERYWHERE;
    let unexpected = present - allowed;
    if !unexpected.is_empty() {
        return Err(VerifyError::Unexpected { unexpected });
    }

    let disallowed_repeat = repeated - PayloadSet::REPEATABLE;
    if !disallowed_repeat.is_empty() {
        return Err(VerifyError::DisallowedRepeat {
            repeated: disallowed_repeat,
        });
    }

    Ok(())
}

/// Verify both halves of a digest against a transition's requirements. The
/// encrypted half is only checked if the transition expects one (not every
/// exchange, e.g. `IKE_SA_INIT`, has an `SK` payload at all).
pub fn verify_message(
    digest: &MessageDigest,
    clear: &PayloadRequirement,
    encrypted: Option<&PayloadRequirement>,
) -> Result<(), VerifyError> {
    verify_half(
        digest.message_payloads.present,
        digest.message_payloads.repeated,
        clear,
    )?;

    match (encrypted, &digest.encrypted_payloads) {
        (Some(req), Some(summary)) => verify_half(summary.present, summary.repeated, req),
        (Some(req), None) if !req.required.is_empty() => Err(VerifyError::MissingRequired {
            missing: req.required,
        }),
        _ => Ok(()),
    }
}
