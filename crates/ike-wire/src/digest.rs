//! Message digest: the payload-presence summary a transition is matched
//! against (spec §4.5).

use crate::header::IkeHeader;
use crate::notify::NotifyMessageType;
use crate::payload::PayloadSet;

/// Which half of the message a [`PayloadSummary`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestHalf {
    /// Payloads outside the `SK`/`SKF` envelope.
    Clear,
    /// Payloads found after decrypting `SK`/`SKF`.
    Encrypted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadSummary {
    pub present: PayloadSet,
    pub repeated: PayloadSet,
    pub first_notification: Option<NotifyMessageType>,
}

impl PayloadSummary {
    pub fn observe(&mut self, bit: PayloadSet) {
        if self.present.contains(bit) {
            self.repeated |= bit;
        }
        self.present |= bit;
    }
}

/// The parsed, not-yet-dispatched incoming message (spec §4.5).
#[derive(Debug, Clone)]
pub struct MessageDigest {
    pub header: IkeHeader,
    pub message_payloads: PayloadSummary,
    /// `None` until the `SK`/`SKF` envelope has actually been decrypted.
    pub encrypted_payloads: Option<PayloadSummary>,
}

impl MessageDigest {
    pub fn new(header: IkeHeader) -> Self {
        Self {
            header,
            message_payloads: PayloadSummary::default(),
            encrypted_payloads: None,
        }
    }

    pub fn is_secured_envelope_present(&self) -> bool {
        self.message_payloads.present.contains(PayloadSet::SK)
    }
}
