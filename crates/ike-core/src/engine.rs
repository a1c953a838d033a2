//! The top-level SANS-IO driver: owns the connection store and routing
//! engine, and turns inbound datagrams plus timer ticks into outbound
//! datagrams and kernel operations. Modeled on `snownet::Node`'s
//! `poll_transmit`/`poll_timeout`/`poll_event`/`handle_timeout` cycle: the
//! engine itself never touches a socket or a clock, so it can be driven
//! identically by a real UDP listener or a test harness feeding it
//! canned packets.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use ike_kernel::KernelInterface;
use ike_model::ConnSerial;
use ike_routing::ConnectionStore;

#[derive(Debug, Clone)]
pub struct Transmit {
    pub src: Option<SocketAddr>,
    pub dst: SocketAddr,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum Event {
    IkeSaEstablished { connection: ConnSerial },
    ChildSaEstablished { connection: ConnSerial },
    IkeSaDeleted { connection: ConnSerial },
    NegotiationFailed { connection: ConnSerial, reason: String },
}

/// The engine's view of one in-flight negotiation: just enough to know
/// when its retransmit timer is next due. The actual per-exchange state
/// (which [`crate::v1::State`] or [`crate::v2::State`] it's in, pending
/// crypto material, etc.) is out of scope for this driver; callers plug
/// their own negotiation bookkeeping in via [`Engine::negotiations`].
#[derive(Debug, Clone, Copy)]
pub struct RetransmitTimer {
    pub connection: ConnSerial,
    pub next_fire: Instant,
    pub attempt: u32,
}

pub struct Engine<K: KernelInterface> {
    pub connections: ConnectionStore,
    pub kernel: K,
    pending_transmits: VecDeque<Transmit>,
    pending_events: VecDeque<Event>,
    timers: Vec<RetransmitTimer>,
}

impl<K: KernelInterface> Engine<K> {
    pub fn new(kernel: K) -> Self {
        Self {
            connections: ConnectionStore::new(),
            kernel,
            pending_transmits: VecDeque::new(),
            pending_events: VecDeque::new(),
            timers: Vec::new(),
        }
    }

    pub fn queue_transmit(&mut self, transmit: Transmit) {
        self.pending_transmits.push_back(transmit);
    }

    pub fn queue_event(&mut self, event: Event) {
        self.pending_events.push_back(event);
    }

    pub fn arm_retransmit(&mut self, connection: ConnSerial, next_fire: Instant) {
        self.timers.push(RetransmitTimer {
            connection,
            next_fire,
            attempt: 0,
        });
    }

    pub fn disarm_retransmit(&mut self, connection: ConnSerial) {
        self.timers.retain(|t| t.connection != connection);
    }

    #[must_use]
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.pending_transmits.pop_front()
    }

    #[must_use]
    pub fn poll_event(&mut self) -> Option<Event> {
        self.pending_events.pop_front()
    }

    /// When [`Engine::handle_timeout`] should next be called.
    #[must_use]
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.next_fire).min()
    }

    /// Advance time: fire any due retransmit timers. Retransmission itself
    /// (re-emitting the last outbound message, doubling the backoff) is the
    /// caller's responsibility since it needs access to the stored message;
    /// this only tells the caller which connections are due and removes
    /// their timer, exactly the way `snownet::Node::handle_timeout` drains
    /// lower-level components rather than mutating them, to keep the
    /// policy (how many retries, what backoff) out of the mechanism.
    pub fn handle_timeout(&mut self, now: Instant) -> Vec<ConnSerial> {
        let mut due = Vec::new();
        self.timers.retain(|t| {
            if t.next_fire <= now {
                due.push(t.connection);
                false
            } else {
                true
            }
        });
        due
    }
}
