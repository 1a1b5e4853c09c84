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

//! Forwarding-table materialization.
//!
//! Renders the accumulated node state into the batch files fed to the forwarding engine's
//! administration tool, plus the auxiliary lookup files the route mediator reads. Rendering is a
//! pure function of the node state; the same state always produces the same bytes.

use crate::node::registry::IntfRegistry;
use crate::node::vrf::VrfModel;
use crate::subnet::IpAddr;
use crate::{Error, Result};

use itertools::Itertools;
use std::fmt::Write;

/// Token the engine administration tool prints when a batch was accepted
pub const ACK_TOKEN: &str = "RuntimeCmd";

/// Ternary wildcard matching any value
pub const WILDCARD: &str = "0&&&0";

/// # ACL Entry
///
/// One drop rule of the ingress ACL, encoded as the 7-tuple the `Filter_ACL` table matches on:
/// destination, source, IP protocol, TCP destination port, TCP source port, UDP destination
/// port, UDP source port. Unset fields match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    fields: [String; 7],
}

impl AclEntry {
    /// Build an entry. Protocol 6 fills the TCP port slots, protocol 17 the UDP slots; the ports
    /// are ignored for any other protocol.
    pub fn new(
        dst: &str,
        src: &str,
        proto: Option<u8>,
        dst_port: Option<u16>,
        src_port: Option<u16>,
    ) -> Self {
        let wild = || WILDCARD.to_string();
        let port = |p: Option<u16>| match p {
            Some(p) => format!("{}&&&0xffff", p),
            None => wild(),
        };
        let mut fields = [dst.to_string(), src.to_string(), wild(), wild(), wild(), wild(), wild()];
        if let Some(proto) = proto {
            fields[2] = format!("{}&&&0xff", proto);
            match proto {
                6 => {
                    fields[3] = port(dst_port);
                    fields[4] = port(src_port);
                }
                17 => {
                    fields[5] = port(dst_port);
                    fields[6] = port(src_port);
                }
                _ => {}
            }
        }
        Self { fields }
    }

    /// The raw match fields, in table order
    pub fn fields(&self) -> &[String; 7] {
        &self.fields
    }
}

/// Render the startup batch: source and destination MAC rewrite, mirroring sessions, VXLAN
/// decapsulation, VRF and bridge-domain assignment per port, and the broadcast multicast groups.
pub fn render_startup(
    loopback: &IpAddr,
    registry: &IntfRegistry,
    vrfs: &VrfModel,
    cpu_input_port: u16,
    cpu_output_port: u16,
) -> Result<String> {
    let mut out = String::new();

    // source MAC rewrite: CPU input port first, then the data ports
    writeln!(out, "table_add SrcMac_RW set_smac {} => aa:00:00:00:00:01", cpu_input_port).ok();
    for (port, intf) in registry.effective() {
        let mac = intf.mac.as_ref().ok_or_else(|| Error::MissingMac(intf.name.clone()))?;
        writeln!(out, "table_add SrcMac_RW set_smac {} => {}", port, mac).ok();
    }

    // punt entry towards the control plane
    writeln!(out, "table_add DstMac_FIB set_dmac 0.0.0.0 => aa:00:00:00:00:02").ok();

    // mirroring sessions used by the telemetry path
    writeln!(out, "mirroring_add 819 {}", cpu_input_port).ok();
    writeln!(out, "mirroring_add 114 {}", cpu_input_port).ok();

    // VXLAN decapsulation, keyed by the node loopback; VRFs without an L3 VNI have no routed
    // overlay and are skipped
    for (_, vnis) in vrfs.iter_vnis() {
        if let Some(l3vni) = vnis.l3 {
            writeln!(
                out,
                "table_add VxlanDecap_Virtual l3vxlan_decap {} {} => {}",
                loopback.addr, l3vni, l3vni
            )
            .ok();
        }
        for l2vni in vnis.l2.iter() {
            writeln!(
                out,
                "table_add VxlanDecap_Virtual l2vxlan_decap {} {} => {}",
                loopback.addr, l2vni, l2vni
            )
            .ok();
        }
    }

    // VRF assignment per ingress port; the CPU output port always lands in the default VRF
    for (port, intf) in registry.effective() {
        let vrf_id = vrfs.vrf_id(intf.vrf())?;
        writeln!(out, "table_add SetVrf_Virtual set_vrf {} => {}", port, vrf_id).ok();
    }
    writeln!(out, "table_add SetVrf_Virtual set_vrf {} => 0", cpu_output_port).ok();

    // bridge-domain assignment per ingress port
    for (port, intf) in registry.effective() {
        if let Some(bdi) = intf.bdi() {
            writeln!(out, "table_add SetBD_Virtual set_broadcast_domain {} => {}", port, bdi).ok();
        }
    }

    // one multicast group per bridge domain, ports in attachment order (bdi doubles as vni and
    // multicast group id)
    for (bdi, members) in vrfs.bridge_domains() {
        writeln!(out, "table_add EthernetMcast_FIB l2mcast_forward {} => {}", bdi, bdi).ok();
        let ports = members
            .iter()
            .map(|name| {
                registry.port_of(name).ok_or_else(|| Error::UnknownInterface(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        writeln!(out, "mc_mgrp_add {} {}", bdi, ports.iter().join(" ")).ok();
    }

    Ok(out)
}

/// Render a subnet batch: destination-MAC rewrite entries for remote addresses. Batches are
/// appended to the previously rendered ones, never overwritten.
pub fn render_subnet(entries: &[(String, String)]) -> String {
    let mut out = String::new();
    for (ip, mac) in entries.iter() {
        writeln!(out, "table_add DstMac_FIB set_dmac {} => {}", ip, mac).ok();
    }
    out
}

/// Render the ACL batch
pub fn render_acl(entries: &[AclEntry]) -> String {
    let mut out = String::new();
    for entry in entries.iter() {
        writeln!(out, "table_add Filter_ACL acl_drop {} => 1", entry.fields.join(" ")).ok();
    }
    out
}

/// Render the kernel-table to VRF lookup file consumed by the route mediator
pub fn render_table_vrf(vrfs: &VrfModel) -> String {
    let mut out = String::new();
    for (table, vrf_id) in vrfs.table_vrf() {
        writeln!(out, "{} {}", table, vrf_id).ok();
    }
    out
}

/// Parse a kernel-table to VRF lookup file
pub fn parse_table_vrf(content: &str) -> Result<Vec<(u32, u32)>> {
    parse_pairs(content, "TableVrfDict", |k, v| Some((k.parse().ok()?, v.parse().ok()?)))
}

/// Render the interface to port lookup file consumed by the route mediator
pub fn render_intf_port(registry: &IntfRegistry) -> String {
    let mut out = String::new();
    for (port, intf) in registry.effective() {
        writeln!(out, "{} {}", intf.name, port).ok();
    }
    out
}

/// Parse an interface to port lookup file
pub fn parse_intf_port(content: &str) -> Result<Vec<(String, u16)>> {
    parse_pairs(content, "IntfPortDict", |k, v| Some((k.to_string(), v.parse().ok()?)))
}

fn parse_pairs<T>(
    content: &str,
    file: &str,
    mut build: impl FnMut(&str, &str) -> Option<T>,
) -> Result<Vec<T>> {
    let mut result = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let parsed = match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(v), None) => build(k, v),
            _ => None,
        };
        match parsed {
            Some(entry) => result.push(entry),
            None => {
                return Err(Error::ParseLine { file: file.to_string(), line: line.to_string() })
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::intf::Intf;
    use crate::node::vrf::OverwritePolicy;

    fn addressed(name: &str, ip: &str, mac: &str) -> Intf {
        Intf::with_addr(name, IpAddr::new(ip, 24), mac)
    }

    #[test]
    fn acl_tcp_entry_fills_the_tcp_slots() {
        let entry = AclEntry::new("10.0.0.1", WILDCARD, Some(6), Some(80), None);
        assert_eq!(
            entry.fields(),
            &[
                "10.0.0.1".to_string(),
                "0&&&0".to_string(),
                "6&&&0xff".to_string(),
                "80&&&0xffff".to_string(),
                "0&&&0".to_string(),
                "0&&&0".to_string(),
                "0&&&0".to_string(),
            ]
        );
    }

    #[test]
    fn acl_udp_entry_fills_the_udp_slots() {
        let entry = AclEntry::new(WILDCARD, "10.0.0.2", Some(17), Some(53), Some(1024));
        assert_eq!(entry.fields()[3], "0&&&0");
        assert_eq!(entry.fields()[5], "53&&&0xffff");
        assert_eq!(entry.fields()[6], "1024&&&0xffff");
    }

    #[test]
    fn acl_rendering() {
        let entries = vec![AclEntry::new("10.0.0.1", WILDCARD, Some(6), Some(80), None)];
        assert_eq!(
            render_acl(&entries),
            "table_add Filter_ACL acl_drop 10.0.0.1 0&&&0 6&&&0xff 80&&&0xffff 0&&&0 0&&&0 0&&&0 => 1\n"
        );
    }

    #[test]
    fn startup_batch_end_to_end() {
        let loopback = IpAddr::new("192.168.19.1", 32);
        let mut registry = IntfRegistry::new();
        registry.add(addressed("r1-eth1", "10.0.1.1", "aa:aa:0a:00:01:01"), None);
        registry.add(addressed("r1-eth2", "10.0.2.1", "aa:aa:0a:00:02:01"), None);

        let mut vrfs = VrfModel::new(OverwritePolicy::Allow);
        vrfs.add_vrf("red", 1, 10).unwrap();
        vrfs.add_l3_vni("red", 4000).unwrap();
        vrfs.add_l2_vni("red", 100).unwrap();
        vrfs.attach(100, "r1-eth2").unwrap();
        vrfs.attach(100, "r1-eth1").unwrap();
        registry.get_mut("r1-eth1").unwrap().set_vrf("red");
        registry.get_mut("r1-eth1").unwrap().set_bdi(100);
        registry.get_mut("r1-eth2").unwrap().set_vrf("red");
        registry.get_mut("r1-eth2").unwrap().set_bdi(100);

        let out = render_startup(&loopback, &registry, &vrfs, 80, 81).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "table_add SrcMac_RW set_smac 80 => aa:00:00:00:00:01");
        assert_eq!(lines[1], "table_add SrcMac_RW set_smac 1 => aa:aa:0a:00:01:01");
        assert_eq!(lines[2], "table_add SrcMac_RW set_smac 2 => aa:aa:0a:00:02:01");
        assert_eq!(lines[3], "table_add DstMac_FIB set_dmac 0.0.0.0 => aa:00:00:00:00:02");
        assert_eq!(lines[4], "mirroring_add 819 80");
        assert_eq!(lines[5], "mirroring_add 114 80");
        assert!(out.contains("table_add VxlanDecap_Virtual l3vxlan_decap 192.168.19.1 4000 => 4000"));
        assert!(out.contains("table_add VxlanDecap_Virtual l2vxlan_decap 192.168.19.1 100 => 100"));
        assert!(out.contains("table_add SetVrf_Virtual set_vrf 1 => 1"));
        assert!(out.contains("table_add SetVrf_Virtual set_vrf 81 => 0"));
        assert!(out.contains("table_add SetBD_Virtual set_broadcast_domain 1 => 100"));
        assert!(out.contains("table_add EthernetMcast_FIB l2mcast_forward 100 => 100"));
        // member ports in attachment order, not port order
        assert!(out.contains("mc_mgrp_add 100 2 1"));

        // the same state renders the same bytes
        assert_eq!(out, render_startup(&loopback, &registry, &vrfs, 80, 81).unwrap());
    }

    #[test]
    fn vrf_without_l3_vni_renders_no_routed_decap() {
        let loopback = IpAddr::new("192.168.19.1", 32);
        let registry = IntfRegistry::new();
        let mut vrfs = VrfModel::default();
        vrfs.add_vrf("blue", 2, 11).unwrap();
        vrfs.add_l2_vni("blue", 200).unwrap();
        let out = render_startup(&loopback, &registry, &vrfs, 80, 81).unwrap();
        assert!(!out.contains("l3vxlan_decap"));
        assert!(out.contains("table_add VxlanDecap_Virtual l2vxlan_decap 192.168.19.1 200 => 200"));
    }

    #[test]
    fn missing_mac_is_an_error() {
        let loopback = IpAddr::new("192.168.19.1", 32);
        let mut registry = IntfRegistry::new();
        registry.add(Intf::new("r1-eth1"), None);
        let vrfs = VrfModel::default();
        assert!(matches!(
            render_startup(&loopback, &registry, &vrfs, 80, 81),
            Err(Error::MissingMac(_))
        ));
    }

    #[test]
    fn subnet_batch_rendering() {
        let entries =
            vec![("10.0.2.0/24".to_string(), "aa:aa:0a:00:02:01".to_string())];
        assert_eq!(
            render_subnet(&entries),
            "table_add DstMac_FIB set_dmac 10.0.2.0/24 => aa:aa:0a:00:02:01\n"
        );
    }

    #[test]
    fn table_vrf_file_round_trips() {
        let mut vrfs = VrfModel::default();
        vrfs.add_vrf("red", 1, 10).unwrap();
        let rendered = render_table_vrf(&vrfs);
        assert_eq!(parse_table_vrf(&rendered).unwrap(), vec![(10, 1), (254, 0), (255, 0)]);
    }

    #[test]
    fn intf_port_file_round_trips() {
        let mut registry = IntfRegistry::new();
        registry.add(addressed("r1-eth1", "10.0.1.1", "aa:aa:0a:00:01:01"), None);
        registry.add(Intf::internal("br100"), None);
        let rendered = render_intf_port(&registry);
        assert_eq!(parse_intf_port(&rendered).unwrap(), vec![("r1-eth1".to_string(), 1)]);
    }

    #[test]
    fn malformed_lookup_line_is_rejected() {
        assert!(matches!(
            parse_table_vrf("10 1 extra"),
            Err(Error::ParseLine { .. })
        ));
    }
}
