//! Shared identity, address, selector, and connection data types for the IKE
//! daemon core. No crate in this workspace other than `ike-model` owns a
//! type used across the protocol/routing boundary, so that everyone agrees
//! on the vocabulary (spec §3, §4.1).

pub mod address;
pub mod connection;
pub mod ids;
pub mod selector;

pub use address::{Address, AddressError, Endpoint, IpVersion, LocalInterface, Protocol};
pub use connection::{
    AuthMethod, Autostart, Connection, ConnectionEnd, ConnectionKind, HostPairKey, IdType,
    IkeVersion, OwnerTable, PeerId, Policy, RoutingState, SerialMap, ShuntKind, SpdEntry,
};
pub use ids::{ChildSaSerial, ConnSerial, IkeSaSerial, InstanceSerial};
pub use selector::{address_blit, Blit, Cidr, Selector};
