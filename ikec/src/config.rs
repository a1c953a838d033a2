//! Typed connection records (spec §6 "Configuration file"): the textual
//! `ipsec.conf` parser itself is an external collaborator out of scope for
//! this core, so `ikec` reads the parser's output in the one typed shape
//! the core actually consumes, serialized as JSON rather than the `conn`
//! keyword syntax. One file per connection under `IPSEC_CONFS`.

use std::net::IpAddr;
use std::path::Path;

use ike_model::{
    Address, AuthMethod, Autostart, Cidr, Connection, ConnectionEnd, ConnectionKind, IdType,
    IkeVersion, OwnerTable, PeerId, Policy, RoutingState, Selector, ShuntKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Address(#[from] ike_model::AddressError),
}

/// One `leftright` side of a `conn` record (spec §6, §3 `ConnectionEnd`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndConfig {
    pub host: IpAddr,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_authby")]
    pub authby: Vec<AuthMethod>,
    #[serde(default)]
    pub subnet: Option<(IpAddr, u8)>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub xauth: bool,
    #[serde(default)]
    pub aggressive: bool,
}

fn default_authby() -> Vec<AuthMethod> {
    vec![AuthMethod::Psk]
}

/// The typed record the core consumes for a `conn` entry (spec §6). Mirrors
/// the keyed lines the config writeback emits: `type=`, `authby=` (per end),
/// `ikev2=`, `pfs=`, `auto=`, `phase2=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub name: String,
    pub left: EndConfig,
    pub right: EndConfig,
    #[serde(default = "default_ike_version")]
    pub ikev2: bool,
    #[serde(default)]
    pub tunnel: bool,
    #[serde(default)]
    pub pfs: bool,
    #[serde(default = "default_autostart")]
    pub auto: Autostart,
    #[serde(default)]
    pub never_negotiate: bool,
    #[serde(default = "default_shunt")]
    pub failure_shunt: ShuntKind,
    #[serde(default = "default_prospective_shunt")]
    pub prospective_shunt: ShuntKind,
}

fn default_ike_version() -> bool {
    true
}

fn default_shunt() -> ShuntKind {
    ShuntKind::None
}

fn default_prospective_shunt() -> ShuntKind {
    ShuntKind::Trap
}

fn default_autostart() -> Autostart {
    Autostart::Ignore
}

fn end(e: &EndConfig) -> Result<ConnectionEnd, ConfigError> {
    let id = match &e.id {
        Some(v) => PeerId {
            id_type: IdType::Fqdn,
            value: v.clone(),
        },
        None => PeerId::any(),
    };
    let child_selectors = match e.subnet {
        Some((addr, prefix)) => vec![Selector::any(Cidr::new(Address::from(addr), prefix)?)],
        None => Vec::new(),
    };
    Ok(ConnectionEnd {
        host: Address::from(e.host),
        id,
        authby: e.authby.clone(),
        child_selectors,
        address_pool: None,
        port: e.port,
        ikeport: None,
        virtual_subnet: None,
        sec_label: None,
        xauth: e.xauth,
        aggressive: e.aggressive,
    })
}

impl ConnectionConfig {
    pub fn into_connection(&self) -> Result<Connection, ConfigError> {
        let mut policy = Policy::ENCRYPT | Policy::AUTHENTICATE;
        if self.tunnel {
            policy |= Policy::TUNNEL;
        }
        if self.pfs {
            policy |= Policy::PFS;
        }
        if matches!(self.auto, Autostart::Ondemand | Autostart::Start) {
            policy |= Policy::ROUTE;
        }

        Ok(Connection {
            name: self.name.clone(),
            serial: ike_model::ConnSerial::next(),
            instance_serial: None,
            local: end(&self.left)?,
            remote: end(&self.right)?,
            ike_version: if self.ikev2 { IkeVersion::V2 } else { IkeVersion::V1 },
            kind: ConnectionKind::Permanent,
            policy,
            autostart: self.auto,
            prospective_shunt: self.prospective_shunt,
            failure_shunt: self.failure_shunt,
            owner: OwnerTable::default(),
            routing: RoutingState::Unrouted,
            ipsec_interface: None,
            never_negotiate: self.never_negotiate,
        })
    }
}

/// Load every `*.json` connection record from `dir` (spec §6 `IPSEC_CONFS`).
pub fn load_dir(dir: &Path) -> Result<Vec<ConnectionConfig>, ConfigError> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Read {
        path: dir.display().to_string(),
        source,
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        out.push(load_file(&path)?);
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

pub fn load_file(path: &Path) -> Result<ConnectionConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
