//! Generic payload header and the payload-type vocabulary used throughout
//! the IKEv2 transition table (spec §4.5, §6).

use bitflags::bitflags;
use bytes::{Buf, BufMut};

use crate::WireError;

pub const GENERIC_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    NoNextPayload,
    SecurityAssociation,
    KeyExchange,
    IdentInitiator,
    IdentResponder,
    Certificate,
    CertificateRequest,
    Authentication,
    NonceInitiator,
    NonceResponder,
    Notify,
    Delete,
    VendorId,
    TrafficSelectorInitiator,
    TrafficSelectorResponder,
    Encrypted,
    Configuration,
    ExtensibleAuth,
    EncryptedFragment,
    Other(u8),
}

impl PayloadType {
    pub fn to_wire(self) -> u8 {
        match self {
            PayloadType::NoNextPayload => 0,
            PayloadType::SecurityAssociation => 33,
            PayloadType::KeyExchange => 34,
            PayloadType::IdentInitiator => 35,
            PayloadType::IdentResponder => 36,
            PayloadType::Certificate => 37,
            PayloadType::CertificateRequest => 38,
            PayloadType::Authentication => 39,
            PayloadType::NonceInitiator | PayloadType::NonceResponder => 40,
            PayloadType::Notify => 41,
            PayloadType::Delete => 42,
            PayloadType::VendorId => 43,
            PayloadType::TrafficSelectorInitiator => 44,
            PayloadType::TrafficSelectorResponder => 45,
            PayloadType::Encrypted => 46,
            PayloadType::Configuration => 47,
            PayloadType::ExtensibleAuth => 48,
            PayloadType::EncryptedFragment => 53,
            PayloadType::Other(v) => v,
        }
    }

    pub fn from_wire(v: u8) -> Self {
        match v {
            0 => PayloadType::NoNextPayload,
            33 => PayloadType::SecurityAssociation,
            34 => PayloadType::KeyExchange,
            35 => PayloadType::IdentInitiator,
            36 => PayloadType::IdentResponder,
            37 => PayloadType::Certificate,
            38 => PayloadType::CertificateRequest,
            39 => PayloadType::Authentication,
            40 => PayloadType::NonceInitiator,
            41 => PayloadType::Notify,
            42 => PayloadType::Delete,
            43 => PayloadType::VendorId,
            44 => PayloadType::TrafficSelectorInitiator,
            45 => PayloadType::TrafficSelectorResponder,
            46 => PayloadType::Encrypted,
            47 => PayloadType::Configuration,
            48 => PayloadType::ExtensibleAuth,
            53 => PayloadType::EncryptedFragment,
            other => PayloadType::Other(other),
        }
    }

    /// The bit this payload type occupies in a [`PayloadSet`].
    pub fn bit(self) -> PayloadSet {
        match self {
            PayloadType::SecurityAssociation => PayloadSet::SA,
            PayloadType::KeyExchange => PayloadSet::KE,
            PayloadType::IdentInitiator => PayloadSet::IDI,
            PayloadType::IdentResponder => PayloadSet::IDR,
            PayloadType::Certificate => PayloadSet::CERT,
            PayloadType::CertificateRequest => PayloadSet::CERTREQ,
            PayloadType::Authentication => PayloadSet::AUTH,
            PayloadType::NonceInitiator | PayloadType::NonceResponder => PayloadSet::NONCE,
            PayloadType::Notify => PayloadSet::N,
            PayloadType::Delete => PayloadSet::D,
            PayloadType::VendorId => PayloadSet::V,
            PayloadType::TrafficSelectorInitiator => PayloadSet::TSI,
            PayloadType::TrafficSelectorResponder => PayloadSet::TSR,
            PayloadType::Encrypted | PayloadType::EncryptedFragment => PayloadSet::SK,
            PayloadType::Configuration => PayloadSet::CP,
            PayloadType::ExtensibleAuth => PayloadSet::EAP,
            PayloadType::NoNextPayload | PayloadType::Other(_) => PayloadSet::empty(),
        }
    }
}

bitflags! {
    /// The set of payload types present (or required/optional) in a
    /// message, used by the transition verifier (spec §4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PayloadSet: u32 {
        const SA      = 1 << 0;
        const KE      = 1 << 1;
        const IDI     = 1 << 2;
        const IDR     = 1 << 3;
        const CERT    = 1 << 4;
        const CERTREQ = 1 << 5;
        const AUTH    = 1 << 6;
        const NONCE   = 1 << 7;
        const N       = 1 << 8;
        const D       = 1 << 9;
        const V       = 1 << 10;
        const TSI     = 1 << 11;
        const TSR     = 1 << 12;
        const SK      = 1 << 13;
        const CP      = 1 << 14;
        const EAP     = 1 << 15;
    }
}

impl PayloadSet {
    /// Payloads allowed to repeat within a single message (spec §4.5).
    pub const REPEATABLE: PayloadSet = PayloadSet::N
        .union(PayloadSet::D)
        .union(PayloadSet::CP)
        .union(PayloadSet::V)
        .union(PayloadSet::CERT)
        .union(PayloadSet::CERTREQ);

    /// Payloads legal in any message regardless of what the transition asks
    /// for (spec §4.5).
    pub const EVERYWHERE: PayloadSet = PayloadSet::N.union(PayloadSet::V);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericPayloadHeader {
    pub next_payload: PayloadType,
    pub critical: bool,
    pub length: u16,
}

impl GenericPayloadHeader {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < GENERIC_HEADER_LEN {
            return Err(WireError::Truncated {
                need: GENERIC_HEADER_LEN,
                have: buf.remaining(),
            });
        }
        let next_payload = PayloadType::from_wire(buf.get_u8());
        let critical_and_reserved = buf.get_u8();
        let length = buf.get_u16();

        Ok(Self {
            next_payload,
            critical: critical_and_reserved & 0x80 != 0,
            length,
        })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.next_payload.to_wire());
        out.put_u8(if self.critical { 0x80 } else { 0x00 });
        out.put_u16(self.length);
    }
}
