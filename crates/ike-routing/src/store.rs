//! The process-wide connection table, indexed by name, serial, and
//! host-pair (spec §4.1, §4.3). Grounded in the connection list / host-pair
//! hash table pattern from the original source and generalized to Rust's
//! `HashMap`-of-indices idiom used by the teacher's peer store.

use std::collections::HashMap;
use std::net::IpAddr;

use ike_model::{ConnSerial, Connection, HostPairKey};

#[derive(Debug, Default)]
pub struct ConnectionStore {
    by_serial: HashMap<ConnSerial, Connection>,
    serial_by_name: HashMap<String, Vec<ConnSerial>>,
    /// Connections with no resolvable local address (e.g. `left=%defaultroute`
    /// before orientation) aren't indexed here; they live only in `by_serial`
    /// until orientation assigns a host pair.
    serials_by_host_pair: HashMap<HostPairKey, Vec<ConnSerial>>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: Connection) -> ConnSerial {
        let serial = connection.serial;
        let host_pair = HostPairKey::for_connection(&connection);

        self.serial_by_name
            .entry(connection.name.clone())
            .or_default()
            .push(serial);
        if let Some(host_pair) = host_pair {
            self.serials_by_host_pair.entry(host_pair).or_default().push(serial);
        }
        self.by_serial.insert(serial, connection);

        serial
    }

    pub fn remove(&mut self, serial: ConnSerial) -> Option<Connection> {
        let connection = self.by_serial.remove(&serial)?;
        let host_pair = HostPairKey::for_connection(&connection);

        if let Some(serials) = self.serial_by_name.get_mut(&connection.name) {
            serials.retain(|s| *s != serial);
        }
        if let Some(host_pair) = host_pair {
            if let Some(serials) = self.serials_by_host_pair.get_mut(&host_pair) {
                serials.retain(|s| *s != serial);
            }
        }

        Some(connection)
    }

    pub fn get(&self, serial: ConnSerial) -> Option<&Connection> {
        self.by_serial.get(&serial)
    }

    pub fn get_mut(&mut self, serial: ConnSerial) -> Option<&mut Connection> {
        self.by_serial.get_mut(&serial)
    }

    pub fn by_name(&self, name: &str) -> impl Iterator<Item = &Connection> {
        self.serial_by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|serial| self.by_serial.get(serial))
    }

    /// Connections sharing a local address with this remote, in insertion
    /// order, followed by any wildcard-remote ("road warrior template")
    /// host pair. This is the list `find_host_pair_connections` would hand
    /// the IKEv1 exact-match filter in `ikev1_host_pair.c`.
    pub fn host_pair_candidates(&self, local: IpAddr, remote: Option<IpAddr>) -> impl Iterator<Item = &Connection> {
        let exact = HostPairKey { local, remote };
        let wildcard = HostPairKey { local, remote: None };

        let exact_serials = self.serials_by_host_pair.get(&exact).into_iter().flatten();
        let wildcard_serials = if remote.is_some() {
            self.serials_by_host_pair.get(&wildcard).into_iter().flatten()
        } else {
            None.into_iter().flatten()
        };

        exact_serials
            .chain(wildcard_serials)
            .filter_map(|serial| self.by_serial.get(serial))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.by_serial.values()
    }

    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }
}
