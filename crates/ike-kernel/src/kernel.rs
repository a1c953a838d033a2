//! The `KernelInterface` vtable (spec §6, §9). The routing engine is the
//! only caller of these operations (spec §4.4); a real backend (xfrm, bsd)
//! implements the trait against the host networking stack, tests plug in
//! [`crate::mock::MockKernel`].

use std::time::Duration;

use ike_model::{Endpoint, LocalInterface, Selector};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelOp {
    Add,
    Replace,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncapType {
    Transport,
    Tunnel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaInfo {
    pub inbound_spi: u32,
    pub outbound_spi: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Lifetime {
    pub soft: Duration,
    pub hard: Duration,
}

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("kernel rejected {op:?} for {why}: {reason}")]
    Rejected {
        op: KernelOp,
        why: &'static str,
        reason: String,
    },
    #[error("backend does not support this operation")]
    Unsupported,
}

/// One raw-eroute/shunt/SA request the routing engine can issue. Kept as a
/// single struct (rather than N trait-method argument lists) so that
/// `MockKernel` can record and replay a call list without needing a
/// parallel enum.
#[derive(Debug, Clone)]
pub struct EsaRequest {
    pub local_endpoint: Endpoint,
    pub local_selector: Selector,
    pub remote_endpoint: Endpoint,
    pub remote_selector: Selector,
    pub cur_spi: u32,
    pub new_spi: u32,
    pub protocol: u8,
    pub transport_proto: u8,
    pub encap_type: EncapType,
    pub sa_info: SaInfo,
    pub lifetime: Lifetime,
    pub priority: u32,
    pub xfrm_if_id: Option<u32>,
    pub op: KernelOp,
    pub why: &'static str,
    pub sec_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdownEvent {
    Prepare,
    Route,
    Unroute,
    Up,
    Down,
}

/// Abstract operations the routing engine invokes to change kernel state
/// (spec §6 "Kernel interface"). Never called from anywhere but
/// `ike-routing`.
pub trait KernelInterface: Send {
    fn raw_eroute(&mut self, req: &EsaRequest) -> Result<(), KernelError>;

    fn shunt_eroute(&mut self, sel: &Selector, shunt: ike_model::ShuntKind, why: &'static str) -> Result<(), KernelError>;
    fn add_bare_shunt(&mut self, sel: &Selector, shunt: ike_model::ShuntKind) -> Result<(), KernelError>;
    fn replace_bare_shunt(&mut self, sel: &Selector, shunt: ike_model::ShuntKind) -> Result<(), KernelError>;
    fn delete_bare_shunt(&mut self, sel: &Selector) -> Result<(), KernelError>;

    fn assign_holdpass(&mut self, sel: &Selector) -> Result<(), KernelError>;
    fn orphan_holdpass(&mut self, sel: &Selector) -> Result<(), KernelError>;

    fn install_inbound_ipsec_sa(&mut self, req: &EsaRequest) -> Result<SaInfo, KernelError>;
    fn install_outbound_ipsec_sa(&mut self, req: &EsaRequest) -> Result<SaInfo, KernelError>;

    fn do_updown(&mut self, event: UpdownEvent, connection_name: &str) -> Result<(), KernelError>;

    /// The interfaces this backend currently has bound (spec §4.3). `None`
    /// means orientation isn't enforced against this backend; a real
    /// backend always returns `Some`, even if empty.
    fn local_interfaces(&self) -> Option<Vec<LocalInterface>> {
        None
    }
}
