//! Orientation: matching a connection's ends against the interfaces this
//! daemon actually has bound (spec §4.3). Ported from `orient()` in
//! `initiate.c`, minus the interface-binding side effect (`ike-kernel`
//! reports what's already bound; this crate never opens sockets).

use ike_model::{Connection, ConnectionEnd, LocalInterface};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrientError {
    #[error("both ends of the connection match our interface {0}")]
    BothEndsLocal(LocalInterface),
    #[error("two interfaces match this connection: {0} and {1}")]
    AmbiguousMatch(LocalInterface, LocalInterface),
    #[error("no local interface matches either end")]
    NoMatch,
}

fn end_matches(end: &ConnectionEnd, ifp: &LocalInterface) -> bool {
    end.host == ifp.endpoint.address && end.ikeport.unwrap_or(ifp.endpoint.port) == ifp.endpoint.port
}

/// Orient `c` against `interfaces`, swapping ends in place so that the end
/// matching a bound local interface is always `local`. A connection that
/// already has a local end bound to one of `interfaces` is left alone.
pub fn orient(c: &mut Connection, interfaces: &[LocalInterface]) -> Result<(), OrientError> {
    let mut matched: Option<(bool, LocalInterface)> = None;

    for ifp in interfaces {
        let this_matches = end_matches(&c.local, ifp);
        let that_matches = end_matches(&c.remote, ifp);

        if this_matches && that_matches {
            return Err(OrientError::BothEndsLocal(*ifp));
        }
        if !this_matches && !that_matches {
            continue;
        }

        if let Some((_, first)) = matched {
            return Err(OrientError::AmbiguousMatch(first, *ifp));
        }
        matched = Some((that_matches, *ifp));
    }

    match matched {
        Some((false, _)) => {
            tracing::trace!(connection = %c.name, "already oriented");
            Ok(())
        }
        Some((true, ifp)) => {
            tracing::debug!(connection = %c.name, interface = %ifp, "swapping ends to orient");
            std::mem::swap(&mut c.local, &mut c.remote);
            Ok(())
        }
        None => orient_new_iface_endpoint(c),
    }
}

/// No bound interface matched either end. Fall back the way the original
/// does: bind a new endpoint for whichever end configured a custom
/// `ikeport`, preferring `local`.
fn orient_new_iface_endpoint(c: &mut Connection) -> Result<(), OrientError> {
    if c.local.ikeport.is_some() && c.local.host.is_set() {
        tracing::debug!(connection = %c.name, "binding new interface endpoint for custom ikeport (local)");
        return Ok(());
    }
    if c.remote.ikeport.is_some() && c.remote.host.is_set() {
        tracing::debug!(connection = %c.name, "binding new interface endpoint for custom ikeport (remote), swapping");
        std::mem::swap(&mut c.local, &mut c.remote);
        return Ok(());
    }
    Err(OrientError::NoMatch)
}
