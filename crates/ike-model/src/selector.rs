//! CIDRs, selectors, and the `address_blit` byte-op primitive (spec §3, §4.1).

use serde::{Deserialize, Serialize};

use crate::address::{Address, AddressError, IpVersion, Protocol};

/// A prefix (`address/prefix_len`), e.g. a `leftsubnet=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cidr {
    pub address: Address,
    pub prefix_len: u8,
}

impl Cidr {
    pub fn new(address: Address, prefix_len: u8) -> Result<Self, AddressError> {
        let version = address.version().ok_or(AddressError::Unset)?;
        if prefix_len > version.bit_len() {
            return Err(AddressError::MaskTooWide(prefix_len, version.bit_len()));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    pub fn host(address: Address) -> Result<Self, AddressError> {
        let version = address.version().ok_or(AddressError::Unset)?;
        Self::new(address, version.bit_len())
    }

    /// The network address: host bits cleared.
    pub fn network(&self) -> Result<Address, AddressError> {
        address_blit(&self.address, self.prefix_len, Blit::Keep, Blit::Zero)
    }

    /// The broadcast/all-ones-host address (meaningful for IPv4 only, but
    /// defined for both the way the original source's `blit` routine is).
    pub fn broadcast(&self) -> Result<Address, AddressError> {
        address_blit(&self.address, self.prefix_len, Blit::Keep, Blit::One)
    }

    pub fn contains_address(&self, addr: &Address) -> bool {
        let (Some(mine), Some(theirs)) = (self.address.version(), addr.version()) else {
            return false;
        };
        if mine != theirs {
            return false;
        }
        let Ok(my_net) = address_blit(&self.address, self.prefix_len, Blit::Keep, Blit::Zero)
        else {
            return false;
        };
        let Ok(their_net) = address_blit(addr, self.prefix_len, Blit::Keep, Blit::Zero) else {
            return false;
        };
        my_net == their_net
    }

    /// Is `inner` fully contained within `self`? (subnet-in-subnet, spec §4.1)
    pub fn contains_subnet(&self, inner: &Cidr) -> bool {
        inner.prefix_len >= self.prefix_len && self.contains_address(&inner.address)
    }
}

/// An IP range plus optional protocol and port range (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub cidr: Cidr,
    pub protocol: Protocol,
    /// Inclusive `(low, high)`; `None` means "any port".
    pub port_range: Option<(u16, u16)>,
}

impl Selector {
    pub fn any(cidr: Cidr) -> Self {
        Self {
            cidr,
            protocol: Protocol::Any,
            port_range: None,
        }
    }

    pub fn contains_address(&self, addr: &Address) -> bool {
        self.cidr.contains_address(addr)
    }

    pub fn contains_endpoint(&self, ep: &crate::address::Endpoint) -> bool {
        if !self.cidr.contains_address(&ep.address) {
            return false;
        }
        if !matches!(self.protocol, Protocol::Any) && self.protocol != ep.protocol {
            return false;
        }
        match self.port_range {
            None => true,
            Some((lo, hi)) => ep.port >= lo && ep.port <= hi,
        }
    }

    pub fn contains_subnet(&self, inner: &Cidr) -> bool {
        self.cidr.contains_subnet(inner)
    }
}

/// The three byte-ops `address_blit` can apply to the prefix and host parts
/// of an address independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blit {
    /// Leave the bits as they are.
    Keep,
    /// Clear the bits (AND with zero).
    Zero,
    /// Set the bits (OR with all-ones).
    One,
}

/// Split `addr`'s byte array at the `mask_bits` boundary and independently
/// apply `prefix_op`/`host_op` to the prefix/host parts (spec §4.1). Used to
/// synthesize network addresses, broadcast addresses, and netmasks.
///
/// When `mask_bits` falls on a byte boundary the crossover-byte branch is
/// skipped entirely (spec §8 boundary behavior); `mask_bits` equal to the
/// address bit-length is legal, greater is rejected.
pub fn address_blit(
    addr: &Address,
    mask_bits: u8,
    prefix_op: Blit,
    host_op: Blit,
) -> Result<Address, AddressError> {
    let version = addr.version().ok_or(AddressError::Unset)?;
    if mask_bits > version.bit_len() {
        return Err(AddressError::MaskTooWide(mask_bits, version.bit_len()));
    }

    let mut bytes = addr.to_bytes()?;
    let full_prefix_bytes = (mask_bits / 8) as usize;
    let remainder_bits = mask_bits % 8;

    apply_whole_bytes(&mut bytes[..full_prefix_bytes], prefix_op);

    if remainder_bits == 0 {
        apply_whole_bytes(&mut bytes[full_prefix_bytes..], host_op);
    } else {
        let crossover = full_prefix_bytes;
        let top_mask: u8 = 0xFFu8 << (8 - remainder_bits);
        let bottom_mask: u8 = !top_mask;
        let orig = bytes[crossover];

        let prefix_contribution = match prefix_op {
            Blit::Keep => orig & top_mask,
            Blit::Zero => 0,
            Blit::One => top_mask,
        };
        let host_contribution = match host_op {
            Blit::Keep => orig & bottom_mask,
            Blit::Zero => 0,
            Blit::One => bottom_mask,
        };
        bytes[crossover] = prefix_contribution | host_contribution;

        apply_whole_bytes(&mut bytes[crossover + 1..], host_op);
    }

    match version {
        IpVersion::V4 => {
            let arr: [u8; 4] = bytes.try_into().expect("v4 address is always 4 bytes");
            Ok(Address::v4(arr.into()))
        }
        IpVersion::V6 => {
            let arr: [u8; 16] = bytes.try_into().expect("v6 address is always 16 bytes");
            Ok(Address::v6(arr.into()))
        }
    }
}

fn apply_whole_bytes(bytes: &mut [u8], op: Blit) {
    match op {
        Blit::Keep => {}
        Blit::Zero => bytes.iter_mut().for_each(|b| *b = 0),
        Blit::One => bytes.iter_mut().for_each(|b| *b = 0xFF),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    #[test]
    fn network_and_broadcast() {
        let cidr = Cidr::new(Address::v4(Ipv4Addr::new(192, 0, 2, 130)), 24).unwrap();
        assert_eq!(
            cidr.network().unwrap(),
            Address::v4(Ipv4Addr::new(192, 0, 2, 0))
        );
        assert_eq!(
            cidr.broadcast().unwrap(),
            Address::v4(Ipv4Addr::new(192, 0, 2, 255))
        );
    }

    #[test]
    fn non_byte_boundary_mask() {
        // 192.0.2.130/26 -> network 192.0.2.128, broadcast 192.0.2.191
        let cidr = Cidr::new(Address::v4(Ipv4Addr::new(192, 0, 2, 130)), 26).unwrap();
        assert_eq!(
            cidr.network().unwrap(),
            Address::v4(Ipv4Addr::new(192, 0, 2, 128))
        );
        assert_eq!(
            cidr.broadcast().unwrap(),
            Address::v4(Ipv4Addr::new(192, 0, 2, 191))
        );
    }

    #[test]
    fn mask_wider_than_address_is_rejected() {
        let addr = Address::v4(Ipv4Addr::new(1, 2, 3, 4));
        assert!(matches!(
            address_blit(&addr, 33, Blit::Keep, Blit::Zero),
            Err(AddressError::MaskTooWide(33, 32))
        ));
    }

    #[test]
    fn mask_equal_to_width_is_legal() {
        let addr = Address::v4(Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(
            address_blit(&addr, 32, Blit::Keep, Blit::Zero).unwrap(),
            addr
        );
    }

    proptest! {
        #[test]
        fn blit_keep_keep_is_idempotent(a in any::<u32>(), m in 0u8..=32) {
            let addr = Address::v4(Ipv4Addr::from(a));
            let out = address_blit(&addr, m, Blit::Keep, Blit::Keep).unwrap();
            prop_assert_eq!(out, addr);
        }

        #[test]
        fn subnet_containment_is_reflexive(a in any::<u32>(), m in 0u8..=32) {
            let cidr = Cidr::new(Address::v4(Ipv4Addr::from(a)), m).unwrap();
            prop_assert!(cidr.contains_subnet(&cidr));
        }
    }
}
