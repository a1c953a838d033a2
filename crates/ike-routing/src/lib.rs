//! Connection storage, host-pair matching, instantiation, and the routing
//! finite-state machine (spec §4.1-§4.4). This crate is the only caller of
//! `ike-kernel`; `ike-core`'s IKE state machines ask it to fire routing
//! events rather than touching the kernel directly.

pub mod engine;
pub mod host_pair;
pub mod instantiate;
pub mod orient;
pub mod store;

pub use engine::{dispatch, DispatchError, RoutingEvent};
pub use host_pair::{find_host_pair_connection, ProposedPolicy};
pub use instantiate::{
    opportunistic_initiator_instantiate, opportunistic_responder_instantiate,
    road_warrior_responder_instantiate,
};
pub use orient::{orient, OrientError};
pub use store::ConnectionStore;
