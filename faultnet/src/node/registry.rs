// Faultnet: Emulating Multi-AS Networks for Distributed Fault Diagnosis
// Copyright (C) 2024  Faultnet Developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Per-node interface registry: numeric port to interface mapping.

use crate::intf::Intf;

use std::collections::{BTreeMap, HashMap};

/// First port number handed out on a node
pub const PORT_BASE: u16 = 1;

/// # Interface Registry
///
/// Owns all interfaces of a node and maps them to numeric forwarding-engine ports. Port numbers
/// are unique and monotonically increasing while the topology grows; removed ports are not
/// reused within a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntfRegistry {
    intfs: BTreeMap<u16, Intf>,
    name_port: HashMap<String, u16>,
}

impl IntfRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next port number to allocate
    pub fn new_port(&self) -> u16 {
        self.intfs.keys().next_back().map(|p| p + 1).unwrap_or(PORT_BASE)
    }

    /// Add an interface, assigning it the given port, or the next free port when omitted.
    /// Returns the assigned port.
    pub fn add(&mut self, intf: Intf, port: Option<u16>) -> u16 {
        let port = port.unwrap_or_else(|| self.new_port());
        self.name_port.insert(intf.name.clone(), port);
        self.intfs.insert(port, intf);
        port
    }

    /// Remove an interface by name. No-op when the name is not registered.
    pub fn remove(&mut self, name: &str) -> Option<Intf> {
        let port = self.name_port.remove(name)?;
        self.intfs.remove(&port)
    }

    /// Look up an interface by name
    pub fn get(&self, name: &str) -> Option<&Intf> {
        self.name_port.get(name).and_then(|p| self.intfs.get(p))
    }

    /// Look up an interface by name, mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Intf> {
        let port = *self.name_port.get(name)?;
        self.intfs.get_mut(&port)
    }

    /// Look up an interface by port
    pub fn by_port(&self, port: u16) -> Option<&Intf> {
        self.intfs.get(&port)
    }

    /// The port of a named interface
    pub fn port_of(&self, name: &str) -> Option<u16> {
        self.name_port.get(name).copied()
    }

    /// Number of registered interfaces
    pub fn len(&self) -> usize {
        self.intfs.len()
    }

    /// Returns true if no interface is registered
    pub fn is_empty(&self) -> bool {
        self.intfs.is_empty()
    }

    /// All interfaces, in port order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Intf)> {
        self.intfs.iter().map(|(p, i)| (*p, i))
    }

    /// The effective interfaces (data ports used for table provisioning), in port order
    pub fn effective(&self) -> impl Iterator<Item = (u16, &Intf)> {
        self.iter().filter(|(_, i)| i.is_effective())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ports_are_strictly_increasing() {
        let mut reg = IntfRegistry::new();
        let mut last = 0;
        for i in 0..10 {
            let port = reg.add(Intf::new(format!("eth{}", i)), None);
            assert!(port > last);
            last = port;
        }
        assert_eq!(reg.len(), 10);
    }

    #[test]
    fn explicit_port_is_respected() {
        let mut reg = IntfRegistry::new();
        assert_eq!(reg.add(Intf::new("eth0"), Some(5)), 5);
        assert_eq!(reg.new_port(), 6);
        assert_eq!(reg.port_of("eth0"), Some(5));
    }

    #[test]
    fn removal_is_idempotent() {
        let mut reg = IntfRegistry::new();
        reg.add(Intf::new("eth0"), None);
        assert!(reg.remove("eth0").is_some());
        assert!(reg.remove("eth0").is_none());
        assert!(reg.get("eth0").is_none());
    }

    #[test]
    fn removed_ports_are_not_reused() {
        let mut reg = IntfRegistry::new();
        reg.add(Intf::new("eth0"), None);
        let p1 = reg.add(Intf::new("eth1"), None);
        reg.remove("eth0");
        assert!(reg.add(Intf::new("eth2"), None) > p1);
    }

    #[test]
    fn internal_interfaces_are_not_effective() {
        let mut reg = IntfRegistry::new();
        reg.add(Intf::new("eth0"), None);
        reg.add(Intf::internal("br100"), None);
        reg.add(Intf::new("eth1"), None);
        let eff: Vec<_> = reg.effective().map(|(_, i)| i.name.clone()).collect();
        assert_eq!(eff, vec!["eth0".to_string(), "eth1".to_string()]);
    }
}
