//! `IDi`/`IDr` and `AUTH` payloads (spec §6).

use bytes::{Buf, BufMut, Bytes};

use crate::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    Ipv4Address,
    Fqdn,
    RfcUserFqdn,
    Ipv6Address,
    DerAsn1Dn,
    KeyId,
    Other(u8),
}

impl IdType {
    fn to_wire(self) -> u8 {
        match self {
            IdType::Ipv4Address => 1,
            IdType::Fqdn => 2,
            IdType::RfcUserFqdn => 3,
            IdType::Ipv6Address => 5,
            IdType::DerAsn1Dn => 9,
            IdType::KeyId => 11,
            IdType::Other(v) => v,
        }
    }

    fn from_wire(v: u8) -> Self {
        match v {
            1 => IdType::Ipv4Address,
            2 => IdType::Fqdn,
            3 => IdType::RfcUserFqdn,
            5 => IdType::Ipv6Address,
            9 => IdType::DerAsn1Dn,
            11 => IdType::KeyId,
            other => IdType::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPayload {
    pub id_type: IdType,
    pub data: Bytes,
}

impl IdPayload {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated {
                need: 4,
                have: buf.remaining(),
            });
        }
        let id_type = IdType::from_wire(buf.get_u8());
        buf.advance(3); // reserved
        let data = buf.copy_to_bytes(buf.remaining());
        Ok(Self { id_type, data })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.id_type.to_wire());
        out.put_slice(&[0, 0, 0]);
        out.put_slice(&self.data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    RsaDigitalSignature,
    SharedKeyMessageIntegrityCode,
    DssDigitalSignature,
    Null,
    DigitalSignature,
    Other(u8),
}

impl AuthMethod {
    fn to_wire(self) -> u8 {
        match self {
            AuthMethod::RsaDigitalSignature => 1,
            AuthMethod::SharedKeyMessageIntegrityCode => 2,
            AuthMethod::DssDigitalSignature => 3,
            AuthMethod::Null => 13,
            AuthMethod::DigitalSignature => 14,
            AuthMethod::Other(v) => v,
        }
    }

    fn from_wire(v: u8) -> Self {
        match v {
            1 => AuthMethod::RsaDigitalSignature,
            2 => AuthMethod::SharedKeyMessageIntegrityCode,
            3 => AuthMethod::DssDigitalSignature,
            13 => AuthMethod::Null,
            14 => AuthMethod::DigitalSignature,
            other => AuthMethod::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    pub method: AuthMethod,
    pub data: Bytes,
}

impl AuthPayload {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated {
                need: 4,
                have: buf.remaining(),
            });
        }
        let method = AuthMethod::from_wire(buf.get_u8());
        buf.advance(3);
        let data = buf.copy_to_bytes(buf.remaining());
        Ok(Self { method, data })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.method.to_wire());
        out.put_slice(&[0, 0, 0]);
        out.put_slice(&self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_payload_round_trips() {
        let id = IdPayload {
            id_type: IdType::Fqdn,
            data: Bytes::from_static(b"gw.example.com"),
        };
        let mut buf = bytes::BytesMut::new();
        id.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(IdPayload::decode(&mut cursor).unwrap(), id);
    }

    #[test]
    fn auth_payload_round_trips() {
        let auth = AuthPayload {
            method: AuthMethod::DigitalSignature,
            data: Bytes::from_static(b"signature-bytes"),
        };
        let mut buf = bytes::BytesMut::new();
        auth.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(AuthPayload::decode(&mut cursor).unwrap(), auth);
    }
}
