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

//! Routing-suite configuration accumulator.
//!
//! Nodes with the routing capability collect configuration lines per protocol daemon while the
//! topology is being built, and materialize them into the suite's configuration files when the
//! node starts. Rendering is deterministic for a given accumulated state.

use std::collections::BTreeMap;
use std::fmt;

/// A protocol daemon of the routing suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// Kernel interaction daemon, always enabled
    Zebra,
    /// BGP
    Bgpd,
    /// OSPFv2
    Ospfd,
    /// OSPFv3
    Ospf6d,
    /// RIP
    Ripd,
    /// RIPng
    Ripngd,
    /// IS-IS
    Isisd,
    /// BFD
    Bfdd,
}

impl Protocol {
    /// All protocol daemons, in daemons-file order
    pub const ALL: [Protocol; 8] = [
        Protocol::Zebra,
        Protocol::Bgpd,
        Protocol::Ospfd,
        Protocol::Ospf6d,
        Protocol::Ripd,
        Protocol::Ripngd,
        Protocol::Isisd,
        Protocol::Bfdd,
    ];

    /// Daemon name as it appears in the daemons file and configuration file names
    pub fn daemon(&self) -> &'static str {
        match self {
            Protocol::Zebra => "zebra",
            Protocol::Bgpd => "bgpd",
            Protocol::Ospfd => "ospfd",
            Protocol::Ospf6d => "ospf6d",
            Protocol::Ripd => "ripd",
            Protocol::Ripngd => "ripngd",
            Protocol::Isisd => "isisd",
            Protocol::Bfdd => "bfdd",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.daemon())
    }
}

/// # Routing Configuration
///
/// Accumulated configuration of the routing suite running on a node. Lines added without a
/// protocol end up in the suite's general configuration file; lines added for a protocol are
/// written to that daemon's own file. Zebra is always enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    software: String,
    enabled: BTreeMap<Protocol, bool>,
    configs: BTreeMap<Protocol, Vec<String>>,
    general: Vec<String>,
}

impl RoutingConfig {
    /// Create an empty configuration for the given routing suite (e.g. `frr` or `quagga`)
    pub fn new(software: impl Into<String>) -> Self {
        let mut enabled = BTreeMap::new();
        for p in Protocol::ALL.iter() {
            enabled.insert(*p, *p == Protocol::Zebra);
        }
        Self { software: software.into(), enabled, configs: BTreeMap::new(), general: Vec::new() }
    }

    /// Name of the routing suite
    pub fn software(&self) -> &str {
        &self.software
    }

    /// Root of the suite's configuration directory inside the container
    pub fn config_root(&self) -> String {
        format!("/etc/{}", self.software)
    }

    /// Enable a protocol daemon
    pub fn enable(&mut self, protocol: Protocol) {
        self.enabled.insert(protocol, true);
    }

    /// Returns true if the daemon is enabled
    pub fn is_enabled(&self, protocol: Protocol) -> bool {
        self.enabled.get(&protocol).copied().unwrap_or(false)
    }

    /// Append a configuration line. With a protocol, the line goes to that daemon's file (and
    /// enables the daemon); without, to the general configuration file.
    pub fn add(&mut self, protocol: Option<Protocol>, line: impl Into<String>) {
        match protocol {
            Some(p) => {
                self.enabled.insert(p, true);
                self.configs.entry(p).or_default().push(line.into());
            }
            None => self.general.push(line.into()),
        }
    }

    /// All enabled protocols, in daemons-file order
    pub fn enabled_protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        Protocol::ALL.iter().copied().filter(move |p| self.is_enabled(*p))
    }

    /// Render the suite's daemons file
    pub fn render_daemons_file(&self) -> String {
        let mut out = String::new();
        for p in Protocol::ALL.iter() {
            out.push_str(&format!(
                "{}={}\n",
                p.daemon(),
                if self.is_enabled(*p) { "yes" } else { "no" }
            ));
        }
        out.push('\n');
        for p in self.enabled_protocols() {
            out.push_str(&format!(
                "{}_options=\"-f {}/{}.conf\"\n",
                p.daemon(),
                self.config_root(),
                p.daemon()
            ));
        }
        out
    }

    /// Render the general configuration file
    pub fn render_general(&self, hostname: &str) -> String {
        let mut out = format!("hostname {}\npassword zebra\n\n", hostname);
        for line in self.general.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Render the configuration file of one protocol daemon
    pub fn render_protocol(&self, protocol: Protocol) -> String {
        let mut out = String::new();
        for line in self.configs.get(&protocol).map(|v| v.as_slice()).unwrap_or(&[]) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zebra_is_always_enabled() {
        let cfg = RoutingConfig::new("frr");
        assert!(cfg.is_enabled(Protocol::Zebra));
        assert!(!cfg.is_enabled(Protocol::Bgpd));
    }

    #[test]
    fn adding_a_line_enables_the_daemon() {
        let mut cfg = RoutingConfig::new("frr");
        cfg.add(Some(Protocol::Bgpd), "router bgp 65001");
        assert!(cfg.is_enabled(Protocol::Bgpd));
        assert_eq!(cfg.render_protocol(Protocol::Bgpd), "router bgp 65001\n");
    }

    #[test]
    fn daemons_file_lists_options_of_enabled_daemons() {
        let mut cfg = RoutingConfig::new("frr");
        cfg.enable(Protocol::Ospfd);
        let daemons = cfg.render_daemons_file();
        assert!(daemons.contains("zebra=yes\n"));
        assert!(daemons.contains("ospfd=yes\n"));
        assert!(daemons.contains("bgpd=no\n"));
        assert!(daemons.contains("ospfd_options=\"-f /etc/frr/ospfd.conf\"\n"));
        assert!(!daemons.contains("bgpd_options"));
    }

    #[test]
    fn general_config_carries_hostname_header() {
        let mut cfg = RoutingConfig::new("quagga");
        cfg.add(None, "ip route 10.0.0.0/8 blackhole");
        assert_eq!(
            cfg.render_general("r1"),
            "hostname r1\npassword zebra\n\nip route 10.0.0.0/8 blackhole\n"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut cfg = RoutingConfig::new("frr");
        cfg.add(Some(Protocol::Bgpd), "router bgp 65001");
        cfg.add(Some(Protocol::Ospfd), "router ospf");
        let a = cfg.render_daemons_file();
        let b = cfg.render_daemons_file();
        assert_eq!(a, b);
    }
}
