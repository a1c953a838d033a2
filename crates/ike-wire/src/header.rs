//! The IKE fixed header (spec §6). All numeric fields are big-endian; we
//! decode/encode with `bytes::Buf`/`BufMut`, whose `get_uN`/`put_uN` methods
//! are network-byte-order by construction, so there is no byte-swapping to
//! get wrong.

use bitflags::bitflags;
use bytes::{Buf, BufMut};

use crate::payload::PayloadType;
use crate::WireError;

pub const HEADER_LEN: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeType {
    // IKEv2
    IkeSaInit,
    IkeAuth,
    CreateChildSa,
    Informational,
    IkeIntermediate,
    // IKEv1
    IdentityProtection, // Main Mode
    AggressiveMode,
    QuickMode,
    Other(u8),
}

impl ExchangeType {
    fn to_wire(self) -> u8 {
        match self {
            ExchangeType::IkeSaInit => 34,
            ExchangeType::IkeAuth => 35,
            ExchangeType::CreateChildSa => 36,
            ExchangeType::Informational => 37,
            ExchangeType::IkeIntermediate => 43,
            ExchangeType::IdentityProtection => 2,
            ExchangeType::AggressiveMode => 4,
            ExchangeType::QuickMode => 32,
            ExchangeType::Other(v) => v,
        }
    }

    fn from_wire(v: u8) -> Self {
        match v {
            34 => ExchangeType::IkeSaInit,
            35 => ExchangeType::IkeAuth,
            36 => ExchangeType::CreateChildSa,
            37 => ExchangeType::Informational,
            43 => ExchangeType::IkeIntermediate,
            2 => ExchangeType::IdentityProtection,
            4 => ExchangeType::AggressiveMode,
            32 => ExchangeType::QuickMode,
            other => ExchangeType::Other(other),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u8 {
        const RESPONSE       = 1 << 5;
        const VERSION        = 1 << 4;
        const INITIATOR      = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IkeHeader {
    pub initiator_spi: u64,
    pub responder_spi: u64,
    pub next_payload: PayloadType,
    pub major_version: u8,
    pub minor_version: u8,
    pub exchange_type: ExchangeType,
    pub flags: HeaderFlags,
    pub message_id: u32,
    pub length: u32,
}

impl IkeHeader {
    pub fn is_request(&self) -> bool {
        !self.flags.contains(HeaderFlags::RESPONSE)
    }

    pub fn is_initiator_spi_owner(&self) -> bool {
        self.flags.contains(HeaderFlags::INITIATOR)
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < HEADER_LEN {
            return Err(WireError::Truncated {
                need: HEADER_LEN,
                have: buf.remaining(),
            });
        }

        let initiator_spi = buf.get_u64();
        let responder_spi = buf.get_u64();
        let next_payload = PayloadType::from_wire(buf.get_u8());
        let version = buf.get_u8();
        let exchange_type = ExchangeType::from_wire(buf.get_u8());
        let flags = HeaderFlags::from_bits_truncate(buf.get_u8());
        let message_id = buf.get_u32();
        let length = buf.get_u32();

        Ok(Self {
            initiator_spi,
            responder_spi,
            next_payload,
            major_version: version >> 4,
            minor_version: version & 0x0f,
            exchange_type,
            flags,
            message_id,
            length,
        })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u64(self.initiator_spi);
        out.put_u64(self.responder_spi);
        out.put_u8(self.next_payload.to_wire());
        out.put_u8((self.major_version << 4) | (self.minor_version & 0x0f));
        out.put_u8(self.exchange_type.to_wire());
        out.put_u8(self.flags.bits());
        out.put_u32(self.message_id);
        out.put_u32(self.length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips() {
        let hdr = IkeHeader {
            initiator_spi: 0x1122334455667788,
            responder_spi: 0,
            next_payload: PayloadType::SecurityAssociation,
            major_version: 2,
            minor_version: 0,
            exchange_type: ExchangeType::IkeSaInit,
            flags: HeaderFlags::INITIATOR,
            message_id: 0,
            length: 128,
        };

        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);

        let mut cursor = &buf[..];
        let decoded = IkeHeader::decode(&mut cursor).unwrap();
        assert_eq!(decoded, hdr);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let mut cursor = &[0u8; 10][..];
        assert!(matches!(
            IkeHeader::decode(&mut cursor),
            Err(WireError::Truncated { .. })
        ));
    }
}
