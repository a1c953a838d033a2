//! Address / endpoint algebra (spec §3, §4.1).
//!
//! An [`Address`] is deliberately not `std::net::IpAddr`: the wire and
//! config layers need to represent "unset" (no address configured yet, e.g.
//! a road-warrior template before its peer connects) as distinct from the
//! all-zeros address, which is itself a meaningful value (`0.0.0.0`/`::`
//! "any"). `std::net::IpAddr` cannot express that third state, so we keep an
//! explicit tri-state instead of overloading a sentinel value.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub const fn bit_len(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }

    pub const fn byte_len(self) -> usize {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 16,
        }
    }
}

/// IP protocol number carried by an endpoint or selector, narrowed to the
/// values this daemon cares about plus a catch-all for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Any,
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
    Other(u8),
}

impl Protocol {
    pub const fn number(self) -> u8 {
        match self {
            Protocol::Any => 0,
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Icmp => 1,
            Protocol::Icmpv6 => 58,
            Protocol::Other(n) => n,
        }
    }

    pub const fn from_number(n: u8) -> Self {
        match n {
            0 => Protocol::Any,
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            1 => Protocol::Icmp,
            58 => Protocol::Icmpv6,
            other => Protocol::Other(other),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is unset")]
    Unset,
    #[error("mismatched IP versions: {0:?} vs {1:?}")]
    VersionMismatch(IpVersion, IpVersion),
    #[error("mask of {0} bits exceeds address width of {1} bits")]
    MaskTooWide(u8, u8),
}

/// An address that may be "unset" (no value configured), distinct from the
/// any-address (`0.0.0.0` / `::`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    Unset,
    Set(IpAddr),
}

impl Address {
    pub const UNSET: Self = Address::Unset;

    pub fn v4(a: Ipv4Addr) -> Self {
        Address::Set(IpAddr::V4(a))
    }

    pub fn v6(a: Ipv6Addr) -> Self {
        Address::Set(IpAddr::V6(a))
    }

    pub const fn is_set(&self) -> bool {
        matches!(self, Address::Set(_))
    }

    pub const fn is_unset(&self) -> bool {
        matches!(self, Address::Unset)
    }

    pub fn is_any(&self) -> bool {
        match self {
            Address::Unset => false,
            Address::Set(a) => a.is_unspecified(),
        }
    }

    pub fn is_loopback(&self) -> bool {
        match self {
            Address::Unset => false,
            Address::Set(a) => a.is_loopback(),
        }
    }

    /// "Specified" in the original source's sense: set and not the any-address.
    pub fn is_specified(&self) -> bool {
        self.is_set() && !self.is_any()
    }

    pub fn version(&self) -> Option<IpVersion> {
        match self {
            Address::Unset => None,
            Address::Set(IpAddr::V4(_)) => Some(IpVersion::V4),
            Address::Set(IpAddr::V6(_)) => Some(IpVersion::V6),
        }
    }

    pub fn as_ip(&self) -> Result<IpAddr, AddressError> {
        match self {
            Address::Unset => Err(AddressError::Unset),
            Address::Set(a) => Ok(*a),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AddressError> {
        match self.as_ip()? {
            IpAddr::V4(a) => Ok(a.octets().to_vec()),
            IpAddr::V6(a) => Ok(a.octets().to_vec()),
        }
    }

    /// The `.IN-ADDR.ARPA.` / `.IP6.ARPA.` reverse-lookup form (spec §4.1).
    pub fn reverse_dns(&self) -> Result<String, AddressError> {
        match self.as_ip()? {
            IpAddr::V4(a) => {
                let o = a.octets();
                Ok(format!(
                    "{}.{}.{}.{}.IN-ADDR.ARPA.",
                    o[3], o[2], o[1], o[0]
                ))
            }
            IpAddr::V6(a) => {
                let mut nibbles = String::with_capacity(64);
                for byte in a.octets().iter().rev() {
                    nibbles.push_str(&format!("{:x}.{:x}.", byte & 0x0f, byte >> 4));
                }
                Ok(format!("{nibbles}IP6.ARPA."))
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Unset => write!(f, "<unset>"),
            Address::Set(a) => write!(f, "{a}"),
        }
    }
}

impl From<IpAddr> for Address {
    fn from(a: IpAddr) -> Self {
        Address::Set(a)
    }
}

/// An address plus protocol and port: `local`/`remote` as actually dialed,
/// not as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: Address,
    pub protocol: Protocol,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: Address, protocol: Protocol, port: u16) -> Self {
        Self {
            address,
            protocol,
            port,
        }
    }

    pub fn udp(address: IpAddr, port: u16) -> Self {
        Self {
            address: Address::Set(address),
            protocol: Protocol::Udp,
            port,
        }
    }

    pub fn is_set(&self) -> bool {
        self.address.is_set()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// A bound local interface endpoint, as the kernel reports it (spec §4.3).
/// `encapsulation` mirrors the original source's `host_encap`: whether this
/// endpoint accepts NAT-T encapsulated ESP-in-UDP in addition to bare IKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalInterface {
    pub endpoint: Endpoint,
    pub encapsulation: bool,
}

impl LocalInterface {
    pub fn new(endpoint: Endpoint, encapsulation: bool) -> Self {
        Self { endpoint, encapsulation }
    }
}

impl fmt::Display for LocalInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}
