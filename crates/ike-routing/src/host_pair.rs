//! Responder-side host-pair matching: given a pair of addresses and what
//! the initiator proposed, find the one configured connection that should
//! handle this negotiation (spec §4.3). Ported from `match_v1_connection`
//! in `ikev1_host_pair.c`, generalized to run for both IKE versions.

use ike_model::{AuthMethod, Connection, ConnectionKind, PeerId};

/// What the responder knows about the incoming proposal before a
/// connection has been chosen; narrows the candidate list the same way
/// `host_pair_policy` does.
#[derive(Debug, Clone)]
pub struct ProposedPolicy {
    pub xauth: bool,
    pub aggressive: bool,
    pub peer_id: Option<PeerId>,
    pub authby: Vec<AuthMethod>,
}

/// Try every host-pair candidate in order, returning the first one that
/// matches (spec §4.3: exact match wins, first configured connection in
/// list order otherwise).
pub fn find_host_pair_connection<'a>(
    candidates: impl Iterator<Item = &'a Connection>,
    proposed: &ProposedPolicy,
) -> Option<&'a Connection> {
    candidates.into_iter().find(|c| matches_connection(c, proposed))
}

fn matches_connection(c: &Connection, proposed: &ProposedPolicy) -> bool {
    if c.is_instance() && c.remote.id.is_any() && matches!(c.remote.id.id_type, ike_model::IdType::Address) {
        // An ID_NULL-equivalent instance left over from a previous
        // negotiation; never reused for a fresh one.
        tracing::trace!(connection = %c.name, "skipping ID_NULL instance");
        return false;
    }

    if c.never_negotiate {
        if is_group_instance(c) {
            tracing::trace!(connection = %c.name, "choosing never-negotiate group instance");
            return true;
        }
        tracing::trace!(connection = %c.name, "skipping never-negotiate connection");
        return false;
    }

    if proposed.xauth != c.is_xauth() {
        tracing::trace!(connection = %c.name, "skipping: XAUTH exact match failed");
        return false;
    }
    if proposed.aggressive != c.remote.aggressive {
        tracing::trace!(connection = %c.name, "skipping: aggressive-mode exact match failed");
        return false;
    }

    if let Some(peer_id) = &proposed.peer_id {
        let acceptable = c.remote.id == *peer_id || c.remote.id.is_from_cert() || c.remote.id.is_any();
        if !acceptable {
            tracing::trace!(connection = %c.name, "skipping: peer id mismatch");
            return false;
        }
    }

    if !c.remote.matches_proposed_auth(&proposed.authby) {
        tracing::trace!(connection = %c.name, "skipping: no acceptable auth method in common");
        return false;
    }

    true
}

fn is_group_instance(c: &Connection) -> bool {
    matches!(c.kind, ConnectionKind::Instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ike_model::{
        Address, Autostart, ConnectionEnd, ConnSerial, IdType, IkeVersion, OwnerTable, Policy,
        RoutingState, ShuntKind,
    };
    use std::net::Ipv4Addr;

    fn end(authby: Vec<AuthMethod>) -> ConnectionEnd {
        ConnectionEnd {
            host: Address::v4(Ipv4Addr::new(10, 0, 0, 1)),
            id: PeerId::any(),
            authby,
            child_selectors: vec![],
            address_pool: None,
            port: None,
            ikeport: None,
            virtual_subnet: None,
            sec_label: None,
            xauth: false,
            aggressive: false,
        }
    }

    fn connection(name: &str, authby: Vec<AuthMethod>) -> Connection {
        Connection {
            name: name.to_string(),
            serial: ConnSerial::next(),
            instance_serial: None,
            local: end(vec![]),
            remote: end(authby),
            ike_version: IkeVersion::V2,
            kind: ConnectionKind::Permanent,
            policy: Policy::ENCRYPT | Policy::TUNNEL,
            autostart: Autostart::Ignore,
            prospective_shunt: ShuntKind::Trap,
            failure_shunt: ShuntKind::None,
            owner: OwnerTable::default(),
            routing: RoutingState::Unrouted,
            ipsec_interface: None,
            never_negotiate: false,
        }
    }

    fn proposed(authby: Vec<AuthMethod>) -> ProposedPolicy {
        ProposedPolicy {
            xauth: false,
            aggressive: false,
            peer_id: None,
            authby,
        }
    }

    #[test]
    fn first_connection_with_matching_auth_wins() {
        let psk = connection("psk", vec![AuthMethod::Psk]);
        let rsa = connection("rsa", vec![AuthMethod::RsaSig]);
        let candidates = vec![psk.clone(), rsa];

        let found = find_host_pair_connection(candidates.iter(), &proposed(vec![AuthMethod::Psk]));
        assert_eq!(found.unwrap().name, "psk");
    }

    #[test]
    fn no_common_auth_method_is_no_match() {
        let rsa = connection("rsa", vec![AuthMethod::RsaSig]);
        let candidates = vec![rsa];

        let found = find_host_pair_connection(candidates.iter(), &proposed(vec![AuthMethod::Psk]));
        assert!(found.is_none());
    }

    #[test]
    fn peer_id_mismatch_is_skipped_unless_any_or_from_cert() {
        let mut c = connection("pinned", vec![AuthMethod::Psk]);
        c.remote.id = PeerId {
            id_type: IdType::Fqdn,
            value: "peer.example.com".into(),
        };
        let candidates = vec![c];

        let mut p = proposed(vec![AuthMethod::Psk]);
        p.peer_id = Some(PeerId {
            id_type: IdType::Fqdn,
            value: "someone-else.example.com".into(),
        });

        let found = find_host_pair_connection(candidates.iter(), &p);
        assert!(found.is_none());
    }
}
