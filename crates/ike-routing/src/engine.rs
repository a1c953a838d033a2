//! The routing-state dispatch table (spec §4.4). Ported from `dispatch_1`
//! in `routing.c`: a big `match` keyed on `(event, routing, kind)` that
//! either drives a kernel operation and moves `connection.routing` to its
//! next state, or hits an unreachable arm, which here is a typed error
//! instead of `PEXPECT`'s "log and carry on" since a test harness should
//! fail loud, not limp forward on a partially-updated connection.

use std::panic::Location;

use ike_kernel::{EncapType, EsaRequest, KernelError, KernelInterface, KernelOp, Lifetime, SaInfo, UpdownEvent};
use ike_model::{Connection, ConnectionKind, RoutingState, ShuntKind};
use thiserror::Error;

use crate::orient::{self, OrientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingEvent {
    Route,
    Unroute,
    EstablishIke,
    Initiate,
    EstablishInboundChild,
    EstablishOutboundChild,
    TeardownIke,
    TeardownChild,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no routing transition defined for {event:?} in {routing:?}/{kind:?} ({location})")]
    ProgrammingInvariant {
        event: RoutingEvent,
        routing: RoutingState,
        kind: ConnectionKind,
        location: &'static Location<'static>,
    },
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error("bad address: {0}")]
    Address(#[from] ike_model::AddressError),
    #[error("connection is not oriented: {0}")]
    Unoriented(#[from] OrientError),
    #[error("route busy: {routing:?} has an active tunnel, unroute it first")]
    RouteBusy { routing: RoutingState, kind: ConnectionKind },
}

#[track_caller]
fn invariant(event: RoutingEvent, routing: RoutingState, kind: ConnectionKind) -> DispatchError {
    DispatchError::ProgrammingInvariant {
        event,
        routing,
        kind,
        location: Location::caller(),
    }
}

/// Apply one routing event to `connection`, driving `kernel` as needed and
/// updating `connection.routing` in place.
#[track_caller]
pub fn dispatch(
    event: RoutingEvent,
    connection: &mut Connection,
    kernel: &mut dyn KernelInterface,
) -> Result<(), DispatchError> {
    if let Some(interfaces) = kernel.local_interfaces() {
        orient::orient(connection, &interfaces)?;
    }

    let routing = connection.routing;
    let kind = connection.kind;
    tracing::debug!(connection = %connection.name, ?event, ?routing, ?kind, "routing: start");

    let next = dispatch_1(event, connection, kernel)?;

    tracing::debug!(connection = %connection.name, ?event, from = ?routing, to = ?next, "routing: stop");
    connection.routing = next;
    Ok(())
}

fn configured(kind: ConnectionKind) -> bool {
    matches!(kind, ConnectionKind::Instance) || kind.is_configured()
}

fn dispatch_1(
    event: RoutingEvent,
    c: &Connection,
    kernel: &mut dyn KernelInterface,
) -> Result<RoutingState, DispatchError> {
    use RoutingEvent::*;
    use RoutingState::*;

    let routing = c.routing;
    let kind = c.kind;

    if !configured(kind) && !matches!(kind, ConnectionKind::Group) {
        return Err(invariant(event, routing, kind));
    }

    match (event, routing) {
        (Route, Unrouted) if matches!(kind, ConnectionKind::Group) => Ok(Unrouted),

        (Route, Unrouted) => {
            for sel in &c.local.child_selectors {
                if c.never_negotiate {
                    kernel.shunt_eroute(sel, c.failure_shunt, "route never-negotiate")?;
                } else {
                    kernel.shunt_eroute(sel, c.prospective_shunt, "route ondemand")?;
                }
            }
            kernel.do_updown(UpdownEvent::Route, &c.name)?;
            if c.never_negotiate {
                Ok(RoutedNeverNegotiate)
            } else {
                Ok(RoutedOndemand)
            }
        }

        (Unroute, RoutedOndemand) | (Unroute, RoutedNeverNegotiate) => {
            for sel in &c.local.child_selectors {
                kernel.delete_bare_shunt(sel)?;
            }
            kernel.do_updown(UpdownEvent::Unroute, &c.name)?;
            Ok(Unrouted)
        }
        // An active tunnel must be torn down explicitly first; UNROUTE
        // refuses rather than ripping out a live SA out from under the
        // routing table (spec §4.4's "route busy" row).
        (Unroute, RoutedTunnel) | (Unroute, UnroutedTunnel) => Err(DispatchError::RouteBusy { routing, kind }),
        // Already unrouted (or never routed at all): UNROUTE is idempotent
        // (spec §8 testable property 9).
        (Unroute, r) if !r.has_kernel_policy() => Ok(r),

        (EstablishIke, Unrouted) => Ok(UnroutedBareNegotiation),
        (EstablishIke, UnroutedBareNegotiation) => Ok(UnroutedBareNegotiation),
        (EstablishIke, other) if other.has_kernel_policy() || matches!(other, UnroutedNegotiation | UnroutedInbound) => {
            Ok(other)
        }

        (Initiate, RoutedOndemand) => Ok(RoutedNegotiation),
        (Initiate, Unrouted) if matches!(kind, ConnectionKind::Instance) => Ok(UnroutedBareNegotiation),
        (Initiate, Unrouted) => {
            for sel in &c.local.child_selectors {
                kernel.assign_holdpass(sel)?;
            }
            Ok(UnroutedBareNegotiation)
        }

        (EstablishInboundChild, UnroutedBareNegotiation) | (EstablishInboundChild, UnroutedNegotiation) => {
            install_inbound(c, kernel)?;
            Ok(UnroutedInbound)
        }
        (EstablishInboundChild, RoutedNegotiation) | (EstablishInboundChild, RoutedOndemand) => {
            install_inbound(c, kernel)?;
            Ok(RoutedInboundNegotiation)
        }

        (EstablishOutboundChild, UnroutedInbound) | (EstablishOutboundChild, UnroutedInboundNegotiation) => {
            install_outbound(c, kernel)?;
            kernel.do_updown(UpdownEvent::Up, &c.name)?;
            Ok(UnroutedTunnel)
        }
        (EstablishOutboundChild, RoutedInboundNegotiation) => {
            install_outbound(c, kernel)?;
            kernel.do_updown(UpdownEvent::Up, &c.name)?;
            Ok(RoutedTunnel)
        }

        (TeardownChild, RoutedTunnel) | (TeardownChild, UnroutedTunnel) => {
            for sel in &c.local.child_selectors {
                kernel.delete_bare_shunt(sel)?;
            }
            kernel.do_updown(UpdownEvent::Down, &c.name)?;
            if c.policy.contains(ike_model::Policy::ROUTE) {
                for sel in &c.local.child_selectors {
                    kernel.shunt_eroute(sel, c.prospective_shunt, "revert to ondemand after teardown")?;
                }
                Ok(RoutedOndemand)
            } else {
                Ok(Unrouted)
            }
        }
        (TeardownChild, UnroutedBareNegotiation) | (TeardownChild, UnroutedNegotiation) => Ok(Unrouted),
        (TeardownChild, RoutedNegotiation) => Ok(RoutedOndemand),

        (TeardownIke, UnroutedBareNegotiation) | (TeardownIke, UnroutedNegotiation) => Ok(Unrouted),
        (TeardownIke, RoutedOndemand) | (TeardownIke, RoutedNegotiation) => Ok(RoutedOndemand),
        (TeardownIke, other) if !other.has_kernel_policy() => Ok(Unrouted),

        _ => Err(invariant(event, routing, kind)),
    }
}

fn install_inbound(c: &Connection, kernel: &mut dyn KernelInterface) -> Result<SaInfo, DispatchError> {
    let req = esa_request(c, KernelOp::Add)?;
    Ok(kernel.install_inbound_ipsec_sa(&req)?)
}

fn install_outbound(c: &Connection, kernel: &mut dyn KernelInterface) -> Result<SaInfo, DispatchError> {
    let req = esa_request(c, KernelOp::Add)?;
    Ok(kernel.install_outbound_ipsec_sa(&req)?)
}

fn esa_request(c: &Connection, op: KernelOp) -> Result<EsaRequest, DispatchError> {
    use ike_model::{Endpoint, Protocol, Selector};
    use std::time::Duration;

    let local_selector = match c.local.child_selectors.first().copied() {
        Some(sel) => sel,
        None => Selector::any(ike_model::Cidr::host(c.local.host)?),
    };
    let remote_selector = match c.remote.child_selectors.first().copied() {
        Some(sel) => sel,
        None => Selector::any(ike_model::Cidr::host(c.remote.host)?),
    };

    Ok(EsaRequest {
        local_endpoint: Endpoint::new(c.local.host, Protocol::Udp, c.local.port.unwrap_or(500)),
        local_selector,
        remote_endpoint: Endpoint::new(c.remote.host, Protocol::Udp, c.remote.port.unwrap_or(500)),
        remote_selector,
        cur_spi: 0,
        new_spi: 0,
        protocol: Protocol::Udp.number(),
        transport_proto: 0,
        encap_type: if c.policy.contains(ike_model::Policy::TUNNEL) {
            EncapType::Tunnel
        } else {
            EncapType::Transport
        },
        sa_info: SaInfo::default(),
        lifetime: Lifetime {
            soft: Duration::from_secs(3000),
            hard: Duration::from_secs(3600),
        },
        priority: 0,
        xfrm_if_id: c.ipsec_interface,
        op,
        why: "routing engine dispatch",
        sec_label: c.local.sec_label.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ike_kernel::MockKernel;
    use ike_model::{
        Address, AuthMethod, Autostart, Cidr, ConnSerial, ConnectionEnd, Endpoint, IkeVersion, LocalInterface,
        OwnerTable, PeerId, Policy, Protocol, Selector,
    };
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    fn end() -> ConnectionEnd {
        ConnectionEnd {
            host: Address::v4(Ipv4Addr::new(10, 0, 0, 1)),
            id: PeerId::any(),
            authby: vec![AuthMethod::Psk],
            child_selectors: vec![Selector::any(Cidr::host(Address::v4(Ipv4Addr::new(192, 168, 1, 0))).unwrap())],
            address_pool: None,
            port: None,
            ikeport: None,
            virtual_subnet: None,
            sec_label: None,
            xauth: false,
            aggressive: false,
        }
    }

    fn permanent() -> Connection {
        Connection {
            name: "perm".into(),
            serial: ConnSerial::next(),
            instance_serial: None,
            local: end(),
            remote: end(),
            ike_version: IkeVersion::V2,
            kind: ConnectionKind::Permanent,
            policy: Policy::ENCRYPT | Policy::TUNNEL | Policy::ROUTE,
            autostart: Autostart::Ondemand,
            prospective_shunt: ShuntKind::Trap,
            failure_shunt: ShuntKind::None,
            owner: OwnerTable::default(),
            routing: RoutingState::Unrouted,
            ipsec_interface: None,
            never_negotiate: false,
        }
    }

    #[test]
    fn route_then_initiate_then_full_establish_cycle() {
        let mut c = permanent();
        let mut kernel = MockKernel::new();

        dispatch(RoutingEvent::Route, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::RoutedOndemand);

        dispatch(RoutingEvent::Initiate, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::RoutedNegotiation);

        dispatch(RoutingEvent::EstablishInboundChild, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::RoutedInboundNegotiation);

        dispatch(RoutingEvent::EstablishOutboundChild, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::RoutedTunnel);

        dispatch(RoutingEvent::TeardownChild, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::RoutedOndemand);
    }

    #[test]
    fn unreachable_transition_is_a_typed_error_not_a_panic() {
        let mut c = permanent();
        let mut kernel = MockKernel::new();
        c.routing = RoutingState::RoutedTunnel;

        let err = dispatch(RoutingEvent::Route, &mut c, &mut kernel).unwrap_err();
        assert!(matches!(err, DispatchError::ProgrammingInvariant { .. }));
    }

    #[test]
    fn unroute_on_an_active_tunnel_refuses_as_route_busy() {
        let mut c = permanent();
        let mut kernel = MockKernel::new();
        c.routing = RoutingState::RoutedTunnel;

        let err = dispatch(RoutingEvent::Unroute, &mut c, &mut kernel).unwrap_err();
        assert!(matches!(err, DispatchError::RouteBusy { .. }));
        // Refused, not partially applied.
        assert_eq!(c.routing, RoutingState::RoutedTunnel);
    }

    #[test]
    fn unroute_twice_is_equivalent_to_unroute_once() {
        let mut c = permanent();
        let mut kernel = MockKernel::new();

        dispatch(RoutingEvent::Route, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::RoutedOndemand);

        dispatch(RoutingEvent::Unroute, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::Unrouted);

        // Second UNROUTE while already unrouted is a no-op, not a bug.
        dispatch(RoutingEvent::Unroute, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::Unrouted);
    }

    // Spec §8 testable property 9: issuing UNROUTE twice from any
    // reachable state is equivalent to issuing it once, for every state
    // where UNROUTE doesn't itself refuse with "route busy".
    proptest! {
        #[test]
        fn unroute_is_idempotent_from_any_non_busy_state(idx in 0usize..10) {
            let states = [
                RoutingState::Unrouted,
                RoutingState::UnroutedBareNegotiation,
                RoutingState::UnroutedNegotiation,
                RoutingState::UnroutedInbound,
                RoutingState::UnroutedInboundNegotiation,
                RoutingState::UnroutedFailure,
                RoutingState::RoutedOndemand,
                RoutingState::RoutedNeverNegotiate,
                RoutingState::RoutedFailure,
                RoutingState::RoutedNegotiation,
            ];
            let mut c = permanent();
            let mut kernel = MockKernel::new();
            c.routing = states[idx];

            let first = dispatch(RoutingEvent::Unroute, &mut c, &mut kernel);
            let after_first = c.routing;
            let second = dispatch(RoutingEvent::Unroute, &mut c, &mut kernel);

            prop_assert_eq!(first.is_ok(), second.is_ok());
            if first.is_ok() {
                prop_assert_eq!(after_first, c.routing);
            }
        }
    }

    #[test]
    fn mock_kernel_without_interfaces_skips_orientation() {
        let mut c = permanent();
        // Neither end matches any real interface, but MockKernel::new()
        // reports no interfaces at all, so orientation is not enforced.
        let mut kernel = MockKernel::new();
        dispatch(RoutingEvent::Route, &mut c, &mut kernel).unwrap();
        assert_eq!(c.routing, RoutingState::RoutedOndemand);
    }

    #[test]
    fn dispatch_swaps_ends_when_remote_matches_our_interface() {
        let mut c = permanent();
        c.remote.host = c.local.host;
        c.local.host = Address::v4(Ipv4Addr::new(203, 0, 113, 9));

        let mut kernel = MockKernel::new().with_local_interfaces(vec![LocalInterface::new(
            Endpoint::new(Address::v4(Ipv4Addr::new(10, 0, 0, 1)), Protocol::Udp, 500),
            false,
        )]);

        dispatch(RoutingEvent::Route, &mut c, &mut kernel).unwrap();
        assert_eq!(c.local.host, Address::v4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(c.remote.host, Address::v4(Ipv4Addr::new(203, 0, 113, 9)));
    }

    #[test]
    fn dispatch_fails_when_no_interface_matches_either_end() {
        let mut c = permanent();
        let mut kernel = MockKernel::new().with_local_interfaces(vec![LocalInterface::new(
            Endpoint::new(Address::v4(Ipv4Addr::new(192, 168, 9, 9)), Protocol::Udp, 500),
            false,
        )]);

        let err = dispatch(RoutingEvent::Route, &mut c, &mut kernel).unwrap_err();
        assert!(matches!(err, DispatchError::Unoriented(crate::orient::OrientError::NoMatch)));
        // Refused before dispatch_1 ever ran; routing state untouched.
        assert_eq!(c.routing, RoutingState::Unrouted);
    }
}
