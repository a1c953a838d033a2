//! IKE and Child SA proposal matching (spec §4.7).
//!
//! Encoding/decoding of the wire SA/Proposal/Transform/Attribute payloads
//! lives in `ike-wire`; this crate only implements the matching algorithm,
//! kept independent of wire framing so it can be unit tested directly
//! against in-memory `Proposal` values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which kind of SA a proposal negotiates; determines which transform types
/// are mandatory (spec §4.7: "every mandatory transform").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolId {
    Ike,
    Esp,
    Ah,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformType {
    Encryption,
    Prf,
    Integrity,
    DiffieHellman,
    Esn,
}

impl ProtocolId {
    /// The transform types a proposal for this protocol must specify at
    /// least one transform for, to even be considered (spec §4.7).
    pub fn mandatory_transform_types(self) -> &'static [TransformType] {
        match self {
            ProtocolId::Ike => &[
                TransformType::Encryption,
                TransformType::Prf,
                TransformType::Integrity,
                TransformType::DiffieHellman,
            ],
            ProtocolId::Esp => &[TransformType::Encryption, TransformType::Esn],
            ProtocolId::Ah => &[TransformType::Integrity, TransformType::Esn],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transform {
    pub transform_type: TransformType,
    pub id: u16,
    /// Only meaningful for `Encryption` transforms with a variable key
    /// length (e.g. AES).
    pub key_length: Option<u16>,
}

impl Transform {
    pub fn new(transform_type: TransformType, id: u16) -> Self {
        Self {
            transform_type,
            id,
            key_length: None,
        }
    }

    pub fn with_key_length(mut self, bits: u16) -> Self {
        self.key_length = Some(bits);
        self
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_length {
            Some(kl) => write!(f, "{:?}({}, {kl} bits)", self.transform_type, self.id),
            None => write!(f, "{:?}({})", self.transform_type, self.id),
        }
    }
}

/// One numbered proposal, as appears in an `SA` payload (spec §4.7, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub number: u8,
    pub protocol: ProtocolId,
    pub spi: Vec<u8>,
    pub transforms: Vec<Transform>,
}

impl Proposal {
    pub fn transforms_of(&self, ty: TransformType) -> impl Iterator<Item = &Transform> {
        self.transforms.iter().filter(move |t| t.transform_type == ty)
    }

    /// Every mandatory transform type for this proposal's protocol has at
    /// least one transform listed.
    pub fn is_well_formed(&self) -> bool {
        self.protocol
            .mandatory_transform_types()
            .iter()
            .all(|ty| self.transforms_of(*ty).next().is_some())
    }

    /// Does `local` accept everything `self` (the remote proposal) requires?
    /// For every mandatory transform type, `local`'s transforms for that
    /// type must intersect `self`'s (spec §4.7).
    fn is_acceptable_to(&self, local: &Proposal) -> bool {
        if self.protocol != local.protocol {
            return false;
        }

        self.protocol.mandatory_transform_types().iter().all(|ty| {
            let mut remote_choices = self.transforms_of(*ty);
            let local_choices: Vec<&Transform> = local.transforms_of(*ty).collect();

            remote_choices.any(|remote_t| {
                local_choices
                    .iter()
                    .any(|local_t| transforms_compatible(remote_t, local_t))
            })
        })
    }

    /// The subset of transforms this proposal and `local` agree on, one per
    /// mandatory type, preferring `local`'s first acceptable choice --
    /// this becomes the chosen proposal emitted back to the peer.
    fn intersect(&self, local: &Proposal) -> Proposal {
        let mut chosen = Vec::new();
        for ty in self.protocol.mandatory_transform_types() {
            let remote_choices: Vec<&Transform> = self.transforms_of(*ty).collect();
            if let Some(t) = local
                .transforms_of(*ty)
                .find(|local_t| remote_choices.iter().any(|r| transforms_compatible(r, local_t)))
            {
                chosen.push(*t);
            }
        }

        Proposal {
            number: self.number,
            protocol: self.protocol,
            spi: local.spi.clone(),
            transforms: chosen,
        }
    }
}

fn transforms_compatible(a: &Transform, b: &Transform) -> bool {
    if a.transform_type != b.transform_type || a.id != b.id {
        return false;
    }
    match (a.key_length, b.key_length) {
        (Some(x), Some(y)) => x == y,
        (None, None) => true,
        // A transform with a fixed key length is compatible with one that
        // didn't bother restating it explicitly.
        _ => true,
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProposalError {
    #[error("no proposal intersection")]
    NoProposalChosen,
}

/// Single-pass proposal matching (spec §4.7): iterate remote proposals in
/// order; for each, find the first local proposal it is acceptable to.
/// First local proposal that fits wins the tie-break.
pub fn negotiate(remote_proposals: &[Proposal], local_proposals: &[Proposal]) -> Result<Proposal, ProposalError> {
    for remote in remote_proposals {
        for local in local_proposals {
            if remote.is_acceptable_to(local) {
                let chosen = remote.intersect(local);
                tracing::debug!(
                    remote_number = remote.number,
                    local_number = local.number,
                    transforms = %chosen.transforms.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
                    "proposal accepted"
                );
                return Ok(chosen);
            }
        }
    }

    Err(ProposalError::NoProposalChosen)
}
