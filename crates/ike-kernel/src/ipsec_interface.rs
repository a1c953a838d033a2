//! `ipsec-interface` (virtual device) lifecycle (spec §4.8). Reference
//! counted: the interface object itself, and each CIDR address hung off it,
//! independently, since the same address can be shared by multiple tunnels
//! with different remote peers (grounded in `ipsec_interface.h`'s own
//! comment to that effect).

use std::collections::HashMap;

use ike_model::Cidr;
use thiserror::Error;

/// Some kernels treat `if_id == 0` as "no interface" internally, so a
/// connection configured with `if_id == 0` is remapped to this sentinel
/// (spec §4.8).
pub const REMAPPED_ZERO_IF_ID: u32 = u32::MAX;

#[derive(Debug, Error)]
pub enum IpsecInterfaceError {
    #[error("ipsec-interface backend does not support this platform")]
    Unsupported,
    #[error("interface {0} not found")]
    NotFound(u32),
    #[error("driver rejected the operation: {0}")]
    Driver(String),
}

/// The device operations a real backend must implement (spec §4.8).
pub trait IpsecInterfaceDriver: Send {
    fn link_add(&mut self, if_id: u32, dev_if_id: u32, name: &str) -> Result<(), IpsecInterfaceError>;
    fn link_set_up(&mut self, if_id: u32) -> Result<(), IpsecInterfaceError>;
    fn link_del(&mut self, if_id: u32) -> Result<(), IpsecInterfaceError>;
    fn addr_add(&mut self, if_id: u32, cidr: &Cidr) -> Result<(), IpsecInterfaceError>;
    fn addr_del(&mut self, if_id: u32, cidr: &Cidr) -> Result<(), IpsecInterfaceError>;
    fn addr_find_on_if(&self, if_id: u32, cidr: &Cidr) -> bool;
    fn find_interface(&self, if_id: u32) -> Option<String>;
    fn supported(&self) -> bool;
    fn check_stale(&mut self) -> Vec<u32>;
    fn shutdown(&mut self);

    /// Whether this backend remaps `if_id == 0` (spec §4.8).
    fn remaps_zero_if_id(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct IpsecInterfaceAddress {
    cidr: Cidr,
    refcount: u32,
}

#[derive(Debug)]
pub struct IpsecInterface {
    pub if_id: u32,
    pub dev_if_id: u32,
    pub name: String,
    pub shared: bool,
    refcount: u32,
    addrs: Vec<IpsecInterfaceAddress>,
}

impl IpsecInterface {
    pub fn refcount(&self) -> u32 {
        self.refcount
    }
}

/// The process-wide registry of ipsec-interfaces (spec §4.8, §5 "Global
/// mutable state"). Owned by the event loop thread only.
#[derive(Debug, Default)]
pub struct IpsecInterfaceRegistry {
    by_if_id: HashMap<u32, IpsecInterface>,
}

impl IpsecInterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(&self, if_id: u32, driver: &dyn IpsecInterfaceDriver) -> u32 {
        if if_id == 0 && driver.remaps_zero_if_id() {
            REMAPPED_ZERO_IF_ID
        } else {
            if_id
        }
    }

    /// Create a new ipsec-interface, or addref an existing shared one.
    pub fn alloc(
        &mut self,
        if_id: u32,
        dev_if_id: u32,
        shared: bool,
        name: &str,
        driver: &mut dyn IpsecInterfaceDriver,
    ) -> Result<u32, IpsecInterfaceError> {
        let if_id = self.normalize(if_id, driver);

        if let Some(existing) = self.by_if_id.get_mut(&if_id) {
            if !existing.shared {
                return Err(IpsecInterfaceError::Driver(format!(
                    "if_id {if_id} already in use by a non-shared interface"
                )));
            }
            existing.refcount += 1;
            tracing::debug!(if_id, refcount = existing.refcount, "ipsec-interface addref");
            return Ok(if_id);
        }

        driver.link_add(if_id, dev_if_id, name)?;
        driver.link_set_up(if_id)?;

        self.by_if_id.insert(
            if_id,
            IpsecInterface {
                if_id,
                dev_if_id,
                name: name.to_string(),
                shared,
                refcount: 1,
                addrs: Vec::new(),
            },
        );
        tracing::debug!(if_id, %name, "ipsec-interface created");
        Ok(if_id)
    }

    pub fn delref(&mut self, if_id: u32, driver: &mut dyn IpsecInterfaceDriver) -> Result<(), IpsecInterfaceError> {
        let Some(iface) = self.by_if_id.get_mut(&if_id) else {
            return Err(IpsecInterfaceError::NotFound(if_id));
        };

        iface.refcount = iface.refcount.saturating_sub(1);
        tracing::debug!(if_id, refcount = iface.refcount, "ipsec-interface delref");

        if iface.refcount == 0 {
            driver.link_del(if_id)?;
            self.by_if_id.remove(&if_id);
        }
        Ok(())
    }

    pub fn addr_addref(
        &mut self,
        if_id: u32,
        cidr: Cidr,
        driver: &mut dyn IpsecInterfaceDriver,
    ) -> Result<(), IpsecInterfaceError> {
        let Some(iface) = self.by_if_id.get_mut(&if_id) else {
            return Err(IpsecInterfaceError::NotFound(if_id));
        };

        if let Some(existing) = iface.addrs.iter_mut().find(|a| a.cidr == cidr) {
            existing.refcount += 1;
            return Ok(());
        }

        driver.addr_add(if_id, &cidr)?;
        iface.addrs.push(IpsecInterfaceAddress { cidr, refcount: 1 });
        Ok(())
    }

    pub fn addr_delref(
        &mut self,
        if_id: u32,
        cidr: &Cidr,
        driver: &mut dyn IpsecInterfaceDriver,
    ) -> Result<(), IpsecInterfaceError> {
        let Some(iface) = self.by_if_id.get_mut(&if_id) else {
            return Err(IpsecInterfaceError::NotFound(if_id));
        };

        let Some(pos) = iface.addrs.iter().position(|a| a.cidr == *cidr) else {
            return Ok(());
        };

        iface.addrs[pos].refcount = iface.addrs[pos].refcount.saturating_sub(1);
        if iface.addrs[pos].refcount == 0 {
            driver.addr_del(if_id, cidr)?;
            iface.addrs.remove(pos);
        }
        Ok(())
    }

    pub fn get(&self, if_id: u32) -> Option<&IpsecInterface> {
        self.by_if_id.get(&if_id)
    }

    pub fn len(&self) -> usize {
        self.by_if_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_if_id.is_empty()
    }
}
