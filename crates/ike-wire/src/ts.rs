//! `TSi`/`TSr` (Traffic Selector) payloads (spec §6).

use bytes::{Buf, BufMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficSelector {
    pub protocol: u8,
    pub start_port: u16,
    pub end_port: u16,
    pub start_address: IpAddr,
    pub end_address: IpAddr,
}

impl TrafficSelector {
    const TS_TYPE_IPV4: u8 = 7;
    const TS_TYPE_IPV6: u8 = 8;

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated {
                need: 4,
                have: buf.remaining(),
            });
        }
        let ts_type = buf.get_u8();
        let protocol = buf.get_u8();
        let selector_len = buf.get_u16() as usize;
        let start_port = buf.get_u16();
        let end_port = buf.get_u16();

        let addr_len = match ts_type {
            Self::TS_TYPE_IPV4 => 4,
            Self::TS_TYPE_IPV6 => 16,
            other => return Err(WireError::UnknownTsType(other)),
        };
        if selector_len != 8 + addr_len * 2 {
            return Err(WireError::MalformedTrafficSelector);
        }
        if buf.remaining() < addr_len * 2 {
            return Err(WireError::Truncated {
                need: addr_len * 2,
                have: buf.remaining(),
            });
        }

        let (start_address, end_address) = if ts_type == Self::TS_TYPE_IPV4 {
            let mut s = [0u8; 4];
            let mut e = [0u8; 4];
            buf.copy_to_slice(&mut s);
            buf.copy_to_slice(&mut e);
            (IpAddr::V4(Ipv4Addr::from(s)), IpAddr::V4(Ipv4Addr::from(e)))
        } else {
            let mut s = [0u8; 16];
            let mut e = [0u8; 16];
            buf.copy_to_slice(&mut s);
            buf.copy_to_slice(&mut e);
            (IpAddr::V6(Ipv6Addr::from(s)), IpAddr::V6(Ipv6Addr::from(e)))
        };

        Ok(Self {
            protocol,
            start_port,
            end_port,
            start_address,
            end_address,
        })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        let (ts_type, addr_len): (u8, usize) = match self.start_address {
            IpAddr::V4(_) => (Self::TS_TYPE_IPV4, 4),
            IpAddr::V6(_) => (Self::TS_TYPE_IPV6, 16),
        };
        out.put_u8(ts_type);
        out.put_u8(self.protocol);
        out.put_u16((8 + addr_len * 2) as u16);
        out.put_u16(self.start_port);
        out.put_u16(self.end_port);
        match self.start_address {
            IpAddr::V4(a) => out.put_slice(&a.octets()),
            IpAddr::V6(a) => out.put_slice(&a.octets()),
        }
        match self.end_address {
            IpAddr::V4(a) => out.put_slice(&a.octets()),
            IpAddr::V6(a) => out.put_slice(&a.octets()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsPayload {
    pub selectors: Vec<TrafficSelector>,
}

impl TsPayload {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated {
                need: 4,
                have: buf.remaining(),
            });
        }
        let count = buf.get_u8() as usize;
        buf.advance(3); // reserved

        let mut selectors = Vec::with_capacity(count);
        for _ in 0..count {
            selectors.push(TrafficSelector::decode(buf)?);
        }
        Ok(Self { selectors })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.selectors.len() as u8);
        out.put_slice(&[0, 0, 0]);
        for ts in &self.selectors {
            ts.encode(out);
        }
    }
}
