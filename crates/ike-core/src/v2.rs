//! The IKEv2 state machine (spec §4.5). Ported from the `v2_states`
//! transition table in `ikev2_states.c`: a static list of
//! `(from, exchange, role, message-id rule) -> to` rows, each carrying the
//! payload requirements [`crate::payloads`] checks a message against before
//! the transition is allowed to fire.
//!
//! `message_role` records which half of an exchange *we received*: a row
//! keyed `Request` fires for whichever side is the responder (it receives
//! the request), a row keyed `Response` fires for the initiator. A state
//! that's entered on receiving the *next* exchange's response (`SaInitI`,
//! via the `IKE_SA_INIT` response itself) gets a row here; a state entered
//! only after *sending* the next exchange's own request (`AuthI`,
//! `CreateChildI`, `RekeyIkeI`) has no producing row, since `find_transition`
//! only reacts to inbound messages — the engine sets those states directly
//! when it transmits.

use ike_wire::{ExchangeType, NotifyMessageType, PayloadSet};

use crate::payloads::PayloadRequirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Start,
    SaInitI,
    SaInitR,
    AuthI,
    AuthR,
    Established,
    RekeyIkeI,
    RekeyIkeR,
    CreateChildI,
    CreateChildR,
    DeletingIke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionKey {
    pub from: State,
    pub exchange: ExchangeType,
    pub message_role: MessageRole,
}

pub struct Transition {
    pub key: TransitionKey,
    pub to: State,
    pub secured: bool,
    pub message_payloads: PayloadRequirement,
    pub encrypted_payloads: Option<PayloadRequirement>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("no transition from {from:?} on {exchange:?}/{message_role:?}")]
    NoTransition {
        from: State,
        exchange: ExchangeType,
        message_role: MessageRole,
    },
}

/// The static transition table. Grounded directly in `ikev2_states.c`'s
/// `IKE_SA_INIT`/`IKE_AUTH`/`CREATE_CHILD_SA`/`INFORMATIONAL` rows; narrowed
/// to the exchanges this daemon core negotiates (fragmentation and
/// redirect are handled one layer up, at the wire-decode stage, not here).
///
/// CREATE_CHILD_SA and INFORMATIONAL each cover more than one logical
/// exchange (new-child/rekey-child/rekey-IKE; liveness-probe/child-delete/
/// IKE-delete) under one `TransitionKey`, since the wire shape alone doesn't
/// select a distinct row without risking a duplicate key. The generic row's
/// `to` covers the common case; [`classify_create_child_sa`] and
/// [`classify_informational`] pick the outlier (`RekeyIke`, `IkeDelete`)
/// case, and [`create_child_sa_request_target`]/[`informational_request_target`]
/// turn that classification into the real destination state.
pub fn transitions() -> Vec<Transition> {
    use ike_wire::PayloadSet as P;
    use ExchangeType::*;
    use MessageRole::*;
    use State::*;

    vec![
        Transition {
            key: TransitionKey {
                from: Start,
                exchange: IkeSaInit,
                message_role: Request,
            },
            to: SaInitR,
            secured: false,
            message_payloads: PayloadRequirement {
                required: P::SA | P::KE | P::NONCE,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: None,
        },
        Transition {
            key: TransitionKey {
                from: Start,
                exchange: IkeSaInit,
                message_role: Response,
            },
            to: SaInitI,
            secured: false,
            message_payloads: PayloadRequirement {
                required: P::SA | P::KE | P::NONCE,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: None,
        },
        // Retransmit of the initial request: the responder already replied
        // once (it's sitting in SaInitR) and sees the same request again
        // before its own response reaches the peer.
        Transition {
            key: TransitionKey {
                from: SaInitR,
                exchange: IkeSaInit,
                message_role: Request,
            },
            to: SaInitR,
            secured: false,
            message_payloads: PayloadRequirement {
                required: P::SA | P::KE | P::NONCE,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: None,
        },
        Transition {
            key: TransitionKey {
                from: SaInitR,
                exchange: IkeAuth,
                message_role: Request,
            },
            to: AuthR,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::IDI | P::AUTH | P::SA | P::TSI | P::TSR,
                optional: P::CERT | P::CERTREQ | P::CP | P::N,
                notification: None,
            }),
        },
        // Retransmit of the IKE_AUTH request while the responder's own
        // response is still in flight.
        Transition {
            key: TransitionKey {
                from: AuthR,
                exchange: IkeAuth,
                message_role: Request,
            },
            to: AuthR,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::IDI | P::AUTH | P::SA | P::TSI | P::TSR,
                optional: P::CERT | P::CERTREQ | P::CP | P::N,
                notification: None,
            }),
        },
        Transition {
            key: TransitionKey {
                from: AuthI,
                exchange: IkeAuth,
                message_role: Response,
            },
            to: Established,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::IDR | P::AUTH | P::SA | P::TSI | P::TSR,
                optional: P::CERT | P::CP | P::N,
                notification: Some(NotifyMessageType::TsUnacceptable),
            }),
        },
        Transition {
            key: TransitionKey {
                from: Established,
                exchange: CreateChildSa,
                message_role: Request,
            },
            to: CreateChildR,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::SA | P::NONCE | P::TSI | P::TSR,
                optional: P::KE | P::N | P::CP,
                notification: None,
            }),
        },
        // Retransmit of a new-child/rekey-child request.
        Transition {
            key: TransitionKey {
                from: CreateChildR,
                exchange: CreateChildSa,
                message_role: Request,
            },
            to: CreateChildR,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::SA | P::NONCE | P::TSI | P::TSR,
                optional: P::KE | P::N | P::CP,
                notification: None,
            }),
        },
        // Retransmit of a rekey-IKE request.
        Transition {
            key: TransitionKey {
                from: RekeyIkeR,
                exchange: CreateChildSa,
                message_role: Request,
            },
            to: RekeyIkeR,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::SA | P::NONCE,
                optional: P::KE | P::N,
                notification: None,
            }),
        },
        Transition {
            key: TransitionKey {
                from: CreateChildI,
                exchange: CreateChildSa,
                message_role: Response,
            },
            to: Established,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::SA | P::NONCE | P::TSI | P::TSR,
                optional: P::KE | P::N | P::CP,
                notification: Some(NotifyMessageType::NoProposalChosen),
            }),
        },
        Transition {
            key: TransitionKey {
                from: RekeyIkeI,
                exchange: CreateChildSa,
                message_role: Response,
            },
            to: Established,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::SA | P::NONCE,
                optional: P::KE | P::N,
                notification: Some(NotifyMessageType::NoProposalChosen),
            }),
        },
        Transition {
            key: TransitionKey {
                from: Established,
                exchange: Informational,
                message_role: Request,
            },
            to: Established,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::empty(),
                optional: P::D | P::N | P::CP,
                notification: None,
            }),
        },
        Transition {
            key: TransitionKey {
                from: Established,
                exchange: Informational,
                message_role: Response,
            },
            to: Established,
            secured: true,
            message_payloads: PayloadRequirement {
                required: P::SK,
                optional: P::empty(),
                notification: None,
            },
            encrypted_payloads: Some(PayloadRequirement {
                required: P::empty(),
                optional: P::D | P::N | P::CP,
                notification: None,
            }),
        },
    ]
}

/// Find the transition (if any) that fires when in `from` and a message of
/// this shape arrives.
pub fn find_transition(
    table: &[Transition],
    from: State,
    exchange: ExchangeType,
    message_role: MessageRole,
) -> Result<&Transition, StateError> {
    table
        .iter()
        .find(|t| t.key == TransitionKey { from, exchange, message_role })
        .ok_or(StateError::NoTransition {
            from,
            exchange,
            message_role,
        })
}

/// Anti-DDoS / KE-group / redirect retry notifies (spec §4.5): a response
/// carrying one of these drops the initiator back to `Start`
/// (`IKE_SA_INIT_I0`) to reissue with cookie/KE-group/gateway attached,
/// rather than advancing past `IKE_SA_INIT`.
pub fn is_sa_init_retry_notify(notify: NotifyMessageType) -> bool {
    matches!(
        notify,
        NotifyMessageType::Cookie | NotifyMessageType::InvalidKePayload | NotifyMessageType::Redirect
    )
}

/// Resolves the real next state for an `IKE_SA_INIT` response. `notify` is
/// the notification the response carried in place of a full SA/KE/NONCE set,
/// if any; `default_to` is the table row's own `to` (used verbatim when the
/// response isn't a retry notify — full negotiation, or some other notify
/// the caller has already rejected before getting here).
pub fn resolve_ike_sa_init_response(notify: Option<NotifyMessageType>, default_to: State) -> State {
    match notify {
        Some(n) if is_sa_init_retry_notify(n) => State::Start,
        _ => default_to,
    }
}

/// The three CREATE_CHILD_SA flavors (spec §4.5), in their fixed precedence
/// order: `N(REKEY_SA)` always means a child rekey regardless of what else
/// the message carries; failing that, no traffic selectors at all means the
/// IKE SA itself is being rekeyed; otherwise it's a brand new child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateChildSaKind {
    RekeyChild,
    RekeyIke,
    NewChild,
}

pub fn classify_create_child_sa(present: PayloadSet, has_rekey_sa_notify: bool) -> CreateChildSaKind {
    if has_rekey_sa_notify {
        CreateChildSaKind::RekeyChild
    } else if !present.intersects(PayloadSet::TSI | PayloadSet::TSR) {
        CreateChildSaKind::RekeyIke
    } else {
        CreateChildSaKind::NewChild
    }
}

/// `transitions()`'s CREATE_CHILD_SA request row targets the new-child and
/// rekey-child case (`default_to`, i.e. `CreateChildR`); a rekey-IKE request
/// is redirected into `RekeyIkeR` instead, since it replaces the IKE SA
/// rather than installing a child under it.
pub fn create_child_sa_request_target(kind: CreateChildSaKind, default_to: State) -> State {
    match kind {
        CreateChildSaKind::RekeyIke => State::RekeyIkeR,
        CreateChildSaKind::RekeyChild | CreateChildSaKind::NewChild => default_to,
    }
}

/// The three INFORMATIONAL flavors: an empty `SK` body is a liveness probe
/// (RFC 3706-style DPD over IKEv2), a `D` payload naming a Child SA is a
/// child delete, a `D` payload naming the IKE SA itself tears down the
/// whole parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationalKind {
    LivenessProbe,
    ChildDelete,
    IkeDelete,
}

pub fn classify_informational(has_delete_payload: bool, delete_is_for_ike_sa: bool) -> InformationalKind {
    if !has_delete_payload {
        InformationalKind::LivenessProbe
    } else if delete_is_for_ike_sa {
        InformationalKind::IkeDelete
    } else {
        InformationalKind::ChildDelete
    }
}

/// `transitions()`'s INFORMATIONAL request row targets the common case
/// (`default_to`, i.e. `Established` — liveness probes and child deletes
/// both leave the parent IKE SA right where it was); an IKE-SA delete
/// instead moves to `DeletingIke`.
pub fn informational_request_target(kind: InformationalKind, default_to: State) -> State {
    match kind {
        InformationalKind::IkeDelete => State::DeletingIke,
        InformationalKind::LivenessProbe | InformationalKind::ChildDelete => default_to,
    }
}

/// One problem found by [`self_check`]. Carries no severity: any non-empty
/// result means the table itself is wrong, not that a particular connection
/// misbehaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic(pub String);

/// Startup self-consistency check over the whole table (spec §4.5, testable
/// property 10), run once before the daemon accepts traffic. Mirrors
/// `ikev2_states.c`'s own table self-check: a non-empty result means the
/// static table is broken and nothing should be allowed to dispatch against
/// it.
///
/// Checks performed: no two rows share a `TransitionKey` (an ambiguous
/// table can't be a function); every transition marked `secured` actually
/// requires `SK` in its cleartext payload set; no transition outside
/// `IKE_SA_INIT` is unsecured (only the very first exchange runs before keys
/// exist).
pub fn self_check(table: &[Transition]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (i, t) in table.iter().enumerate() {
        for other in &table[i + 1..] {
            if other.key == t.key {
                diagnostics.push(Diagnostic(format!("duplicate transition key {:?}", t.key)));
            }
        }

        if t.secured && !t.message_payloads.required.contains(PayloadSet::SK) {
            diagnostics.push(Diagnostic(format!(
                "{:?} is marked secured but does not require SK",
                t.key
            )));
        }

        if !t.secured && t.key.exchange != ExchangeType::IkeSaInit {
            diagnostics.push(Diagnostic(format!(
                "{:?} is unsecured outside IKE_SA_INIT",
                t.key
            )));
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sa_init_request_advances_responder_state() {
        let table = transitions();
        let t = find_transition(&table, State::Start, ExchangeType::IkeSaInit, MessageRole::Request).unwrap();
        assert_eq!(t.to, State::SaInitR);
        assert!(!t.secured);
    }

    #[test]
    fn ike_auth_request_requires_encrypted_half() {
        let table = transitions();
        let t = find_transition(&table, State::SaInitR, ExchangeType::IkeAuth, MessageRole::Request).unwrap();
        assert!(t.secured);
        assert!(t.encrypted_payloads.is_some());
    }

    #[test]
    fn ike_auth_response_is_consumed_from_auth_i_not_sa_init_r() {
        let table = transitions();
        let t = find_transition(&table, State::AuthI, ExchangeType::IkeAuth, MessageRole::Response).unwrap();
        assert_eq!(t.to, State::Established);
        // The responder's own state has no row consuming an IkeAuth
        // response: it never receives one.
        assert!(find_transition(&table, State::SaInitR, ExchangeType::IkeAuth, MessageRole::Response).is_err());
    }

    #[test]
    fn unknown_transition_is_a_typed_error() {
        let table = transitions();
        let err = find_transition(&table, State::DeletingIke, ExchangeType::IkeSaInit, MessageRole::Request)
            .unwrap_err();
        assert!(matches!(err, StateError::NoTransition { .. }));
    }

    #[test]
    fn retransmitted_requests_are_idempotent_self_loops() {
        let table = transitions();
        let t = find_transition(&table, State::AuthR, ExchangeType::IkeAuth, MessageRole::Request).unwrap();
        assert_eq!(t.to, State::AuthR);
        let t = find_transition(&table, State::CreateChildR, ExchangeType::CreateChildSa, MessageRole::Request)
            .unwrap();
        assert_eq!(t.to, State::CreateChildR);
    }

    #[test]
    fn cookie_and_invalid_ke_and_redirect_retry_to_start() {
        for notify in [
            NotifyMessageType::Cookie,
            NotifyMessageType::InvalidKePayload,
            NotifyMessageType::Redirect,
        ] {
            assert!(is_sa_init_retry_notify(notify));
            assert_eq!(resolve_ike_sa_init_response(Some(notify), State::SaInitI), State::Start);
        }
    }

    #[test]
    fn unrelated_notify_and_full_negotiation_do_not_retry() {
        assert!(!is_sa_init_retry_notify(NotifyMessageType::NoProposalChosen));
        assert_eq!(
            resolve_ike_sa_init_response(Some(NotifyMessageType::NoProposalChosen), State::SaInitI),
            State::SaInitI
        );
        assert_eq!(resolve_ike_sa_init_response(None, State::SaInitI), State::SaInitI);
    }

    #[test]
    fn create_child_sa_disambiguation_follows_fixed_precedence() {
        let ts = PayloadSet::TSI | PayloadSet::TSR;
        // REKEY_SA wins even when TS payloads are also present.
        assert_eq!(classify_create_child_sa(ts, true), CreateChildSaKind::RekeyChild);
        assert_eq!(classify_create_child_sa(PayloadSet::empty(), true), CreateChildSaKind::RekeyChild);
        // No REKEY_SA, no TS: rekeying the IKE SA itself.
        assert_eq!(classify_create_child_sa(PayloadSet::empty(), false), CreateChildSaKind::RekeyIke);
        // No REKEY_SA, TS present: a brand new child.
        assert_eq!(classify_create_child_sa(ts, false), CreateChildSaKind::NewChild);
    }

    #[test]
    fn rekey_ike_request_is_redirected_off_the_generic_child_row() {
        let table = transitions();
        let base = find_transition(&table, State::Established, ExchangeType::CreateChildSa, MessageRole::Request)
            .unwrap();
        assert_eq!(base.to, State::CreateChildR);
        assert_eq!(
            create_child_sa_request_target(CreateChildSaKind::RekeyIke, base.to),
            State::RekeyIkeR
        );
        assert_eq!(
            create_child_sa_request_target(CreateChildSaKind::NewChild, base.to),
            State::CreateChildR
        );
        assert_eq!(
            create_child_sa_request_target(CreateChildSaKind::RekeyChild, base.to),
            State::CreateChildR
        );
    }

    #[test]
    fn informational_disambiguation_picks_out_ike_sa_delete() {
        assert_eq!(classify_informational(false, false), InformationalKind::LivenessProbe);
        assert_eq!(classify_informational(true, false), InformationalKind::ChildDelete);
        assert_eq!(classify_informational(true, true), InformationalKind::IkeDelete);
        assert_eq!(
            informational_request_target(InformationalKind::IkeDelete, State::Established),
            State::DeletingIke
        );
        assert_eq!(
            informational_request_target(InformationalKind::ChildDelete, State::Established),
            State::Established
        );
    }

    #[test]
    fn self_check_on_the_real_table_finds_nothing() {
        let diagnostics = self_check(&transitions());
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn self_check_flags_a_duplicate_key() {
        let mut table = transitions();
        let dup = Transition {
            key: table[0].key,
            to: table[0].to,
            secured: table[0].secured,
            message_payloads: table[0].message_payloads,
            encrypted_payloads: table[0].encrypted_payloads,
        };
        table.push(dup);
        let diagnostics = self_check(&table);
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn self_check_flags_unsecured_transition_outside_ike_sa_init() {
        let mut table = transitions();
        table.push(Transition {
            key: TransitionKey {
                from: State::Established,
                exchange: ExchangeType::CreateChildSa,
                message_role: MessageRole::Request,
            },
            to: State::CreateChildR,
            secured: false,
            message_payloads: PayloadRequirement {
                required: PayloadSet::empty(),
                optional: PayloadSet::empty(),
                notification: None,
            },
            encrypted_payloads: None,
        });
        let diagnostics = self_check(&table);
        assert!(diagnostics.iter().any(|d| d.0.contains("unsecured outside IKE_SA_INIT")));
    }
}
