//! A `KernelInterface` that records every call instead of touching the
//! host networking stack, plus injectable failures, so routing-engine
//! tests can assert on exactly what the dispatcher asked the kernel to do
//! (spec §9: "Tests must be able to substitute a mock that records every
//! call and injects failures.").

use ike_model::{LocalInterface, Selector, ShuntKind};

use crate::kernel::{EsaRequest, KernelError, KernelInterface, KernelOp, SaInfo, UpdownEvent};

#[derive(Debug, Clone)]
pub enum RecordedCall {
    RawEroute(EsaRequest),
    ShuntEroute { selector: Selector, shunt: ShuntKind, why: &'static str },
    AddBareShunt { selector: Selector, shunt: ShuntKind },
    ReplaceBareShunt { selector: Selector, shunt: ShuntKind },
    DeleteBareShunt { selector: Selector },
    AssignHoldpass { selector: Selector },
    OrphanHoldpass { selector: Selector },
    InstallInboundSa(EsaRequest),
    InstallOutboundSa(EsaRequest),
    Updown { event: UpdownEvent, connection_name: String },
}

/// A single scripted failure: the Nth call (0-indexed, counting only calls
/// that reach the kernel, i.e. after this fault is armed) fails instead of
/// succeeding.
#[derive(Debug, Clone, Copy)]
struct Fault {
    at_call: usize,
    op: KernelOp,
    why: &'static str,
    reason: &'static str,
}

#[derive(Debug, Default)]
pub struct MockKernel {
    pub calls: Vec<RecordedCall>,
    faults: Vec<Fault>,
    next_spi: u32,
    local_interfaces: Option<Vec<LocalInterface>>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            faults: Vec::new(),
            next_spi: 1,
            local_interfaces: None,
        }
    }

    /// Opt this mock into orientation checks against `interfaces` (spec
    /// §4.3). Without this, `local_interfaces()` returns `None` and the
    /// routing engine skips orientation entirely.
    pub fn with_local_interfaces(mut self, interfaces: Vec<LocalInterface>) -> Self {
        self.local_interfaces = Some(interfaces);
        self
    }

    /// Arm a failure for the `n`th call made from now on (0-indexed).
    pub fn fail_call(&mut self, n: usize, op: KernelOp, why: &'static str, reason: &'static str) {
        self.faults.push(Fault {
            at_call: n,
            op,
            why,
            reason,
        });
    }

    fn maybe_fail(&mut self, op: KernelOp) -> Result<(), KernelError> {
        let idx = self.calls.len();
        if let Some(pos) = self.faults.iter().position(|f| f.at_call == idx) {
            let fault = self.faults.remove(pos);
            return Err(KernelError::Rejected {
                op,
                why: fault.why,
                reason: fault.reason.to_string(),
            });
        }
        let _ = op;
        Ok(())
    }

    fn alloc_spi(&mut self) -> u32 {
        let spi = self.next_spi;
        self.next_spi += 1;
        spi
    }
}

impl KernelInterface for MockKernel {
    fn raw_eroute(&mut self, req: &EsaRequest) -> Result<(), KernelError> {
        self.maybe_fail(req.op)?;
        self.calls.push(RecordedCall::RawEroute(req.clone()));
        Ok(())
    }

    fn shunt_eroute(&mut self, sel: &Selector, shunt: ShuntKind, why: &'static str) -> Result<(), KernelError> {
        self.maybe_fail(KernelOp::Replace)?;
        self.calls.push(RecordedCall::ShuntEroute {
            selector: *sel,
            shunt,
            why,
        });
        Ok(())
    }

    fn add_bare_shunt(&mut self, sel: &Selector, shunt: ShuntKind) -> Result<(), KernelError> {
        self.maybe_fail(KernelOp::Add)?;
        self.calls.push(RecordedCall::AddBareShunt { selector: *sel, shunt });
        Ok(())
    }

    fn replace_bare_shunt(&mut self, sel: &Selector, shunt: ShuntKind) -> Result<(), KernelError> {
        self.maybe_fail(KernelOp::Replace)?;
        self.calls.push(RecordedCall::ReplaceBareShunt { selector: *sel, shunt });
        Ok(())
    }

    fn delete_bare_shunt(&mut self, sel: &Selector) -> Result<(), KernelError> {
        self.maybe_fail(KernelOp::Delete)?;
        self.calls.push(RecordedCall::DeleteBareShunt { selector: *sel });
        Ok(())
    }

    fn assign_holdpass(&mut self, sel: &Selector) -> Result<(), KernelError> {
        self.maybe_fail(KernelOp::Add)?;
        self.calls.push(RecordedCall::AssignHoldpass { selector: *sel });
        Ok(())
    }

    fn orphan_holdpass(&mut self, sel: &Selector) -> Result<(), KernelError> {
        self.maybe_fail(KernelOp::Delete)?;
        self.calls.push(RecordedCall::OrphanHoldpass { selector: *sel });
        Ok(())
    }

    fn install_inbound_ipsec_sa(&mut self, req: &EsaRequest) -> Result<SaInfo, KernelError> {
        self.maybe_fail(req.op)?;
        let spi = self.alloc_spi();
        self.calls.push(RecordedCall::InstallInboundSa(req.clone()));
        Ok(SaInfo {
            inbound_spi: spi,
            outbound_spi: 0,
        })
    }

    fn install_outbound_ipsec_sa(&mut self, req: &EsaRequest) -> Result<SaInfo, KernelError> {
        self.maybe_fail(req.op)?;
        let spi = self.alloc_spi();
        self.calls.push(RecordedCall::InstallOutboundSa(req.clone()));
        Ok(SaInfo {
            inbound_spi: 0,
            outbound_spi: spi,
        })
    }

    fn do_updown(&mut self, event: UpdownEvent, connection_name: &str) -> Result<(), KernelError> {
        self.maybe_fail(KernelOp::Add)?;
        self.calls.push(RecordedCall::Updown {
            event,
            connection_name: connection_name.to_string(),
        });
        Ok(())
    }

    fn local_interfaces(&self) -> Option<Vec<LocalInterface>> {
        self.local_interfaces.clone()
    }
}
