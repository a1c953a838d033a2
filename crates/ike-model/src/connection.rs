//! The `Connection` data model (spec §3) and the routing state machine's
//! state enumeration (spec §4.4). The state machine's *transition logic*
//! lives in `ike-routing`; this crate only owns the data it operates on, so
//! that `ike-routing`, `ike-core` and `ikec` can all share one definition.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::address::{Address, Protocol};
use crate::ids::{ChildSaSerial, ConnSerial, IkeSaSerial, InstanceSerial};
use crate::selector::Selector;

bitflags! {
    /// `conn` policy bits (spec §3). Mirrors the original source's `policy`
    /// lset_t one flag per named behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Policy: u32 {
        const ENCRYPT       = 1 << 0;
        const AUTHENTICATE  = 1 << 1;
        const TUNNEL        = 1 << 2; // unset => transport mode
        const PFS           = 1 << 3;
        const COMPRESS      = 1 << 4;
        const OPPORTUNISTIC = 1 << 5;
        const NARROWING     = 1 << 6;
        const ROUTE         = 1 << 7;
        const UP            = 1 << 8;
        const PPK_ALLOW     = 1 << 9;
        const PPK_INSIST    = 1 << 10;
        const IKE_FRAG      = 1 << 11;
        const ESN           = 1 << 12;
        const AUTH_NULL     = 1 << 13;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Autostart {
    Ignore,
    Add,
    Ondemand,
    Start,
    Keep,
}

/// A standalone policy verdict not tied to an SA (spec glossary: "Shunt").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShuntKind {
    Unset,
    Trap,
    Pass,
    Drop,
    Reject,
    Hold,
    None,
    Ipsec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    Group,
    Template,
    Instance,
    Permanent,
    LabeledTemplate,
    LabeledParent,
    LabeledChild,
}

impl ConnectionKind {
    /// A `conn` that is negotiated-on-demand rather than pre-existing
    /// configuration; used throughout `ike-routing` to pick the right
    /// dispatch-table family.
    pub fn is_configured(self) -> bool {
        matches!(
            self,
            ConnectionKind::Group
                | ConnectionKind::Template
                | ConnectionKind::Permanent
                | ConnectionKind::LabeledTemplate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IkeVersion {
    V1,
    V2,
}

/// Routing state (spec §4.4). Kept in `ike-model` (not `ike-routing`) so
/// that every crate speaks the same vocabulary without a dependency cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingState {
    Unrouted,
    UnroutedBareNegotiation,
    UnroutedNegotiation,
    UnroutedInbound,
    UnroutedInboundNegotiation,
    UnroutedTunnel,
    UnroutedFailure,
    RoutedOndemand,
    RoutedNeverNegotiate,
    RoutedNegotiation,
    RoutedInboundNegotiation,
    RoutedTunnel,
    RoutedFailure,
}

impl RoutingState {
    pub fn has_kernel_policy(self) -> bool {
        !matches!(
            self,
            RoutingState::Unrouted
                | RoutingState::UnroutedBareNegotiation
                | RoutingState::UnroutedFailure
        )
    }
}

/// Named owner roles of a connection (spec §3: `owner[]`). A fixed-size
/// record, not a map, so that mutation always goes through one helper that
/// can log before/after (design note in spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerTable {
    pub negotiating_ike: IkeSaSerial,
    pub established_ike: IkeSaSerial,
    pub newest_ipsec: ChildSaSerial,
    pub newest_routing: ChildSaSerial,
}

impl Default for OwnerTable {
    fn default() -> Self {
        Self {
            negotiating_ike: IkeSaSerial::NOBODY,
            established_ike: IkeSaSerial::NOBODY,
            newest_ipsec: ChildSaSerial::NOBODY,
            newest_routing: ChildSaSerial::NOBODY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    Psk,
    RsaSig,
    EcdsaSig,
    Null,
    Eap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdType {
    Address,
    Fqdn,
    UserFqdn,
    KeyId,
    DerAsn1Dn,
    FromCert,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerId {
    pub id_type: IdType,
    /// Textual form; interpretation depends on `id_type`.
    pub value: String,
}

impl PeerId {
    pub fn any() -> Self {
        Self {
            id_type: IdType::Any,
            value: String::new(),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self.id_type, IdType::Any)
    }

    pub fn is_from_cert(&self) -> bool {
        matches!(self.id_type, IdType::FromCert)
    }
}

/// One side (`left`/`right`) of a connection (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEnd {
    pub host: Address,
    pub id: PeerId,
    pub authby: Vec<AuthMethod>,
    pub child_selectors: Vec<Selector>,
    pub address_pool: Option<Selector>,
    pub port: Option<u16>,
    pub ikeport: Option<u16>,
    pub virtual_subnet: Option<Selector>,
    pub sec_label: Option<String>,
    pub xauth: bool,
    pub aggressive: bool,
}

impl ConnectionEnd {
    pub fn matches_proposed_auth(&self, proposed: &[AuthMethod]) -> bool {
        self.authby.iter().any(|m| proposed.contains(m))
    }
}

/// A configured or instantiated policy object (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub serial: ConnSerial,
    pub instance_serial: Option<InstanceSerial>,

    pub local: ConnectionEnd,
    pub remote: ConnectionEnd,

    pub ike_version: IkeVersion,
    pub kind: ConnectionKind,
    pub policy: Policy,
    pub autostart: Autostart,

    pub prospective_shunt: ShuntKind,
    pub failure_shunt: ShuntKind,

    pub owner: OwnerTable,
    pub routing: RoutingState,

    /// `if_id == 0` is a valid configuration value that some kernels remap
    /// internally (spec §4.8); `None` means "no ipsec-interface attached".
    pub ipsec_interface: Option<u32>,

    pub never_negotiate: bool,
}

impl Connection {
    pub fn is_xauth(&self) -> bool {
        self.remote.xauth
    }

    pub fn is_instance(&self) -> bool {
        matches!(
            self.kind,
            ConnectionKind::Instance | ConnectionKind::LabeledParent | ConnectionKind::LabeledChild
        )
    }

    /// Clone this connection as a new instance bound to `remote_addr`,
    /// assigning it a fresh serial and instance-serial (spec §3 lifecycle,
    /// §4.2 road-warrior instantiation).
    pub fn instantiate(&self, remote_addr: Address, kind: ConnectionKind) -> Connection {
        let mut inst = self.clone();
        inst.serial = ConnSerial::next();
        inst.instance_serial = Some(InstanceSerial::next());
        inst.kind = kind;
        inst.remote.host = remote_addr;
        inst.owner = OwnerTable::default();
        inst.routing = RoutingState::Unrouted;
        inst
    }
}

/// An ordered `(local, remote)` key; `remote` may be the any-address
/// wildcard (spec §3 "Host pair").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostPairKey {
    pub local: std::net::IpAddr,
    pub remote: Option<std::net::IpAddr>,
}

impl HostPairKey {
    pub fn for_connection(c: &Connection) -> Option<Self> {
        let local = c.local.host.as_ip().ok()?;
        let remote = match c.remote.host {
            Address::Unset => None,
            Address::Set(a) if a.is_unspecified() => None,
            Address::Set(a) => Some(a),
        };
        Some(Self { local, remote })
    }
}

/// A kernel-policy SPD entry derived from a connection (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpdEntry {
    pub local_selector: Selector,
    pub remote_selector: Selector,
    pub protocol: Protocol,
}

pub type SerialMap<V> = BTreeMap<ConnSerial, V>;
