//! `SA` payload: a list of numbered proposals, each a list of transforms
//! (spec §6). Wire transform-type/attribute codes are mapped onto
//! `ike_proposals::TransformType`; the matching algorithm itself lives in
//! `ike-proposals`.

use bytes::{Buf, BufMut};
use ike_proposals::{Proposal, ProtocolId, Transform, TransformType};

use crate::WireError;

fn transform_type_to_wire(ty: TransformType) -> u8 {
    match ty {
        TransformType::Encryption => 1,
        TransformType::Prf => 2,
        TransformType::Integrity => 3,
        TransformType::DiffieHellman => 4,
        TransformType::Esn => 5,
    }
}

fn transform_type_from_wire(v: u8) -> Option<TransformType> {
    match v {
        1 => Some(TransformType::Encryption),
        2 => Some(TransformType::Prf),
        3 => Some(TransformType::Integrity),
        4 => Some(TransformType::DiffieHellman),
        5 => Some(TransformType::Esn),
        _ => None,
    }
}

fn protocol_to_wire(p: ProtocolId) -> u8 {
    match p {
        ProtocolId::Ike => 1,
        ProtocolId::Ah => 2,
        ProtocolId::Esp => 3,
    }
}

fn protocol_from_wire(v: u8) -> Option<ProtocolId> {
    match v {
        1 => Some(ProtocolId::Ike),
        2 => Some(ProtocolId::Ah),
        3 => Some(ProtocolId::Esp),
        _ => None,
    }
}

const KEY_LENGTH_ATTR_TYPE: u16 = 14 | 0x8000; // TV-encoded, type 14

fn encode_transform(t: &Transform, is_last: bool, out: &mut impl BufMut) {
    let attr_len: usize = if t.key_length.is_some() { 4 } else { 0 };
    let transform_len = 8 + attr_len;

    out.put_u8(if is_last { 0 } else { 3 });
    out.put_u8(0);
    out.put_u16(transform_len as u16);
    out.put_u8(transform_type_to_wire(t.transform_type));
    out.put_u8(0);
    out.put_u16(t.id);
    if let Some(kl) = t.key_length {
        out.put_u16(KEY_LENGTH_ATTR_TYPE);
        out.put_u16(kl);
    }
}

fn decode_transform(buf: &mut impl Buf) -> Result<Transform, WireError> {
    if buf.remaining() < 8 {
        return Err(WireError::Truncated {
            need: 8,
            have: buf.remaining(),
        });
    }
    let _more = buf.get_u8();
    let _reserved = buf.get_u8();
    let transform_len = buf.get_u16() as usize;
    let transform_type_raw = buf.get_u8();
    let _reserved2 = buf.get_u8();
    let id = buf.get_u16();

    let transform_type = transform_type_from_wire(transform_type_raw)
        .ok_or(WireError::UnknownTransformType(transform_type_raw))?;

    let mut key_length = None;
    let consumed_so_far = 8;
    if transform_len > consumed_so_far {
        let attr_bytes = transform_len - consumed_so_far;
        if buf.remaining() < attr_bytes {
            return Err(WireError::Truncated {
                need: attr_bytes,
                have: buf.remaining(),
            });
        }
        if attr_bytes >= 4 {
            let attr_type = buf.get_u16();
            let attr_value = buf.get_u16();
            if attr_type == KEY_LENGTH_ATTR_TYPE {
                key_length = Some(attr_value);
            }
            let extra = attr_bytes - 4;
            buf.advance(extra);
        } else {
            buf.advance(attr_bytes);
        }
    }

    Ok(Transform {
        transform_type,
        id,
        key_length,
    })
}

pub fn encode_proposal(p: &Proposal, is_last: bool, out: &mut impl BufMut) {
    let body_len = 8 + p.spi.len() + transforms_encoded_len(&p.transforms);

    out.put_u8(if is_last { 0 } else { 2 });
    out.put_u8(0);
    out.put_u16(body_len as u16);
    out.put_u8(p.number);
    out.put_u8(protocol_to_wire(p.protocol));
    out.put_u8(p.spi.len() as u8);
    out.put_u8(p.transforms.len() as u8);
    out.put_slice(&p.spi);
    for (i, t) in p.transforms.iter().enumerate() {
        encode_transform(t, i + 1 == p.transforms.len(), out);
    }
}

fn transforms_encoded_len(transforms: &[Transform]) -> usize {
    transforms
        .iter()
        .map(|t| if t.key_length.is_some() { 12 } else { 8 })
        .sum()
}

pub fn decode_proposal(buf: &mut impl Buf) -> Result<(Proposal, bool), WireError> {
    if buf.remaining() < 8 {
        return Err(WireError::Truncated {
            need: 8,
            have: buf.remaining(),
        });
    }
    let more = buf.get_u8();
    let _reserved = buf.get_u8();
    let _proposal_len = buf.get_u16();
    let number = buf.get_u8();
    let protocol_raw = buf.get_u8();
    let spi_size = buf.get_u8() as usize;
    let transform_count = buf.get_u8() as usize;

    let protocol = protocol_from_wire(protocol_raw).ok_or(WireError::UnknownProtocol(protocol_raw))?;

    if buf.remaining() < spi_size {
        return Err(WireError::Truncated {
            need: spi_size,
            have: buf.remaining(),
        });
    }
    let spi = buf.copy_to_bytes(spi_size).to_vec();

    let mut transforms = Vec::with_capacity(transform_count);
    for _ in 0..transform_count {
        transforms.push(decode_transform(buf)?);
    }

    Ok((
        Proposal {
            number,
            protocol,
            spi,
            transforms,
        },
        more == 0,
    ))
}

pub fn encode_sa_payload(proposals: &[Proposal], out: &mut impl BufMut) {
    for (i, p) in proposals.iter().enumerate() {
        encode_proposal(p, i + 1 == proposals.len(), out);
    }
}

pub fn decode_sa_payload(mut buf: impl Buf) -> Result<Vec<Proposal>, WireError> {
    let mut proposals = Vec::new();
    loop {
        let (proposal, was_last) = decode_proposal(&mut buf)?;
        proposals.push(proposal);
        if was_last || buf.remaining() == 0 {
            break;
        }
    }
    Ok(proposals)
}
