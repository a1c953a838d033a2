//! IKEv1/IKEv2 state machines and the SANS-IO event loop that drives them
//! (spec §4.5, §4.6). Depends on `ike-wire` for framing, `ike-proposals`
//! for negotiation, and `ike-routing` for turning a negotiated SA into
//! kernel policy; this is the crate that wires all of those together into
//! one engine.

pub mod engine;
pub mod payloads;
pub mod v1;
pub mod v2;

pub use engine::{Engine, Event, RetransmitTimer, Transmit};
pub use payloads::{verify_half, verify_message, PayloadRequirement, VerifyError};
