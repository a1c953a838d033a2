//! Turning a template connection into a live instance bound to a specific
//! peer (spec §4.2). Grounded on `rw_responder_instantiate` and
//! `oppo_initiator_instantiate` in `instantiate.c`: both just clone the
//! template and fill in the one field that was previously a wildcard.

use ike_model::{Address, Connection, ConnectionKind, Selector};

/// A responder accepting a road-warrior connection learns the peer's real
/// address from the first packet; instantiate the template against it
/// (`rw_responder_instantiate`).
pub fn road_warrior_responder_instantiate(template: &Connection, remote_addr: Address) -> Connection {
    debug_assert!(matches!(template.kind, ConnectionKind::Template));
    template.instantiate(remote_addr, ConnectionKind::Instance)
}

/// An initiator driving an opportunistic template against a specific
/// destination narrows the template's wildcard selector to the exact
/// traffic that triggered it (`oppo_initiator_instantiate`).
pub fn opportunistic_initiator_instantiate(
    template: &Connection,
    remote_addr: Address,
    narrowed_remote_selector: Selector,
) -> Connection {
    debug_assert!(template.policy.contains(ike_model::Policy::OPPORTUNISTIC));
    let mut inst = template.instantiate(remote_addr, ConnectionKind::Instance);
    inst.remote.child_selectors = vec![narrowed_remote_selector];
    inst
}

/// Symmetric to the initiator path: a bare shunt fired on the responder
/// and it needs its own instance before negotiation can begin
/// (`oppo_responder_instantiate`).
pub fn opportunistic_responder_instantiate(
    template: &Connection,
    remote_addr: Address,
    narrowed_local_selector: Selector,
    narrowed_remote_selector: Selector,
) -> Connection {
    debug_assert!(template.policy.contains(ike_model::Policy::OPPORTUNISTIC));
    let mut inst = template.instantiate(remote_addr, ConnectionKind::Instance);
    inst.local.child_selectors = vec![narrowed_local_selector];
    inst.remote.child_selectors = vec![narrowed_remote_selector];
    inst
}
