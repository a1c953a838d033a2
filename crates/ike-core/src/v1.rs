//! The (much smaller) IKEv1 state machine (spec §4.6): Main Mode,
//! Aggressive Mode, Quick Mode, plus the XAUTH and DPD side-protocols.
//! Structured the same way as [`crate::v2`]'s transition table for
//! consistency, but IKEv1 has no generic payload-verification pass (each
//! exchange's payload order is fixed by the RFC, not negotiated), so each
//! row names its next state directly rather than pointing at a
//! [`crate::payloads::PayloadRequirement`].

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Start,
    MainI1,
    MainI2,
    MainI3,
    MainR1,
    MainR2,
    MainR3,
    AggrI1,
    AggrR1,
    AggrI2,
    QuickI1,
    QuickR1,
    QuickI2,
    Established,
    XauthRWaitingForRequest,
    XauthIWaitingForReply,
    DpdActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Main,
    Aggressive,
    Quick,
    XauthR0,
    XauthR1,
    DpdRUUSend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: State,
    pub exchange: Exchange,
    pub role: Role,
    pub to: State,
}

/// Main Mode is a fixed 6-message exchange (3 round trips); Quick Mode a
/// fixed 3-message exchange; Aggressive Mode collapses Main Mode's first
/// two round trips into one.
pub fn transitions() -> Vec<Transition> {
    use Exchange::*;
    use Role::*;
    use State::*;

    vec![
        Transition { from: Start, exchange: Main, role: Initiator, to: MainI1 },
        Transition { from: MainI1, exchange: Main, role: Initiator, to: MainI2 },
        Transition { from: MainI2, exchange: Main, role: Initiator, to: MainI3 },
        Transition { from: MainI3, exchange: Main, role: Initiator, to: Established },
        Transition { from: Start, exchange: Main, role: Responder, to: MainR1 },
        Transition { from: MainR1, exchange: Main, role: Responder, to: MainR2 },
        Transition { from: MainR2, exchange: Main, role: Responder, to: MainR3 },
        Transition { from: MainR3, exchange: Main, role: Responder, to: Established },
        Transition { from: Start, exchange: Aggressive, role: Initiator, to: AggrI1 },
        Transition { from: AggrI1, exchange: Aggressive, role: Initiator, to: AggrI2 },
        Transition { from: AggrI2, exchange: Aggressive, role: Initiator, to: Established },
        Transition { from: Start, exchange: Aggressive, role: Responder, to: AggrR1 },
        Transition { from: AggrR1, exchange: Aggressive, role: Responder, to: Established },
        Transition { from: Established, exchange: Quick, role: Initiator, to: QuickI1 },
        Transition { from: QuickI1, exchange: Quick, role: Initiator, to: QuickI2 },
        Transition { from: QuickI2, exchange: Quick, role: Initiator, to: Established },
        Transition { from: Established, exchange: Quick, role: Responder, to: QuickR1 },
        Transition { from: QuickR1, exchange: Quick, role: Responder, to: Established },
        Transition {
            from: Established,
            exchange: XauthR0,
            role: Responder,
            to: XauthRWaitingForRequest,
        },
        Transition {
            from: XauthRWaitingForRequest,
            exchange: XauthR1,
            role: Responder,
            to: Established,
        },
    ]
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("no IKEv1 transition from {from:?} on {exchange:?}/{role:?}")]
    NoTransition { from: State, exchange: Exchange, role: Role },
}

pub fn find_transition(
    table: &[Transition],
    from: State,
    exchange: Exchange,
    role: Role,
) -> Result<&Transition, StateError> {
    table
        .iter()
        .find(|t| t.from == from && t.exchange == exchange && t.role == role)
        .ok_or(StateError::NoTransition { from, exchange, role })
}

/// DPD (Dead Peer Detection, RFC 3706) runs as an independent notify
/// exchange once a connection is `Established`; it never changes the
/// connection's IKE state, only whether the peer is believed reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpdStatus {
    Active,
    LastAckMissing,
    PeerGone,
}
