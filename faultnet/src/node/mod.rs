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

//! Emulated network node and its lifecycle.
//!
//! A [`Node`] is a container plus optional capabilities: a [`RoutingConfig`] when the node runs
//! a routing suite, and a [`ForwardingConfig`] when it runs a programmable forwarding engine.
//! Topology-building operations (interfaces, VRFs, overlays) accumulate state and issue the
//! matching kernel commands inside the container; the startup sequencer materializes the
//! accumulated state when the node starts.

pub mod registry;
pub mod routing;
pub mod sequencer;
pub mod tables;
pub mod vrf;

pub use registry::IntfRegistry;
pub use routing::{Protocol, RoutingConfig};
pub use sequencer::{RetryPolicy, Stage};
pub use tables::AclEntry;
pub use vrf::{Outcome, OverwritePolicy, VrfModel};

use crate::container::ContainerBacking;
use crate::intf::Intf;
use crate::subnet::{ip_to_mac, IpAddr};
use crate::{Error, Result};

use log::*;
use std::path::PathBuf;

/// Address of the fault-report collector the control-plane agents report to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    /// IP address of the collector
    pub ip: String,
    /// TCP port of the collector
    pub port: u16,
}

impl AdminConfig {
    /// Create a new admin configuration
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }
}

/// # Forwarding Configuration
///
/// Everything needed to run the programmable forwarding engine of a node: the compiled pipeline
/// description, the engine binary, port bindings, logging switches, the control-plane agent
/// binaries to install, and the retry policy of the startup sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardingConfig {
    /// Compiled pipeline description (JSON) on the host
    pub pipeline_json: PathBuf,
    /// Engine binary inside the container
    pub target_path: String,
    /// Thrift server port of the engine
    pub thrift_port: Option<u16>,
    /// Engine port wired to dp-egress (traffic punted to the control plane)
    pub cpu_input_port: u16,
    /// Engine port wired to dp-ingress (traffic originated by the control plane)
    pub cpu_output_port: u16,
    /// Directory for packet captures, when set
    pub pcap_dump: Option<String>,
    /// Mirror engine logs to the console
    pub log_console: bool,
    /// Engine log level
    pub log_level: String,
    /// Publish engine events on the nanomsg socket
    pub nanomsg: bool,
    /// Attach the engine debugger
    pub enable_debugger: bool,
    /// Route mediator binary on the host
    pub mediator: Option<PathBuf>,
    /// Engine administration tool on the host
    pub runtime_api: Option<PathBuf>,
    /// Switch agent binary on the host
    pub switch_agent: Option<PathBuf>,
    /// Packet injector binary on the host
    pub packet_injector: Option<PathBuf>,
    /// BGP advertisement modifier binary on the host
    pub bgp_adv_modifier: Option<PathBuf>,
    /// Host directory where table batches are rendered before the copy
    pub workdir: PathBuf,
    /// Retry policy of the startup sequencer
    pub retry: RetryPolicy,
}

impl ForwardingConfig {
    /// Create a configuration with the default engine and port bindings
    pub fn new(pipeline_json: impl Into<PathBuf>) -> Self {
        Self {
            pipeline_json: pipeline_json.into(),
            target_path: "simple_switch".to_string(),
            thrift_port: None,
            cpu_input_port: 80,
            cpu_output_port: 81,
            pcap_dump: None,
            log_console: false,
            log_level: "trace".to_string(),
            nanomsg: false,
            enable_debugger: false,
            mediator: None,
            runtime_api: None,
            switch_agent: None,
            packet_injector: None,
            bgp_adv_modifier: None,
            workdir: PathBuf::from("."),
            retry: RetryPolicy::default(),
        }
    }
}

/// # Node
///
/// One emulated device: a container backing plus the capabilities composed onto it. A plain
/// container is a host; adding a [`RoutingConfig`] makes it a router; adding a
/// [`ForwardingConfig`] on top makes it a programmable router whose kernel routing suite drives
/// a P4 forwarding engine.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) loopback: IpAddr,
    pub(crate) registry: IntfRegistry,
    pub(crate) vrfs: VrfModel,
    pub(crate) backing: ContainerBacking,
    pub(crate) routing: Option<RoutingConfig>,
    pub(crate) forwarding: Option<ForwardingConfig>,
    pub(crate) admin: Option<AdminConfig>,
    pub(crate) acl: Vec<AclEntry>,
    pub(crate) subnet_entries: Vec<(String, String)>,
    pub(crate) stage: Stage,
}

impl Node {
    /// Create a node on top of a container. The numeric suffix of the name selects the node's
    /// loopback address (`192.168.19.<index+1>`), which is configured right away: both the
    /// routing suite and the VXLAN decapsulation entries key on it.
    pub fn new(name: impl Into<String>, backing: ContainerBacking) -> Result<Self> {
        let name = name.into();
        let digits = name.trim_end_matches(|c: char| !c.is_ascii_digit());
        let digits = &digits[digits.rfind(|c: char| !c.is_ascii_digit()).map(|i| i + 1).unwrap_or(0)..];
        let index: u32 = digits.parse().map_err(|_| Error::InvalidNodeName(name.clone()))?;
        let loopback = IpAddr::new(format!("192.168.19.{}", index + 1), 32);
        backing.exec(&format!("ifconfig lo {} netmask 255.255.255.255 up", loopback.addr))?;
        backing.exec(&format!("ip route add {} dev lo", loopback.addr))?;
        Ok(Self {
            name,
            loopback,
            registry: IntfRegistry::new(),
            vrfs: VrfModel::default(),
            backing,
            routing: None,
            forwarding: None,
            admin: None,
            acl: Vec::new(),
            subnet_entries: Vec::new(),
            stage: Stage::Configured,
        })
    }

    /// Add the routing capability
    pub fn with_routing(mut self, routing: RoutingConfig) -> Result<Self> {
        self.routing = Some(routing);
        Ok(self)
    }

    /// Add the forwarding capability. Fails when the pipeline description does not exist.
    pub fn with_forwarding(mut self, forwarding: ForwardingConfig) -> Result<Self> {
        if !forwarding.pipeline_json.is_file() {
            return Err(Error::MissingPipeline(forwarding.pipeline_json));
        }
        self.forwarding = Some(forwarding);
        Ok(self)
    }

    /// Name of the node
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loopback address of the node
    pub fn loopback(&self) -> &IpAddr {
        &self.loopback
    }

    /// Current startup stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The interface registry
    pub fn registry(&self) -> &IntfRegistry {
        &self.registry
    }

    /// The VRF model
    pub fn vrfs(&self) -> &VrfModel {
        &self.vrfs
    }

    /// The container backing
    pub fn backing(&self) -> &ContainerBacking {
        &self.backing
    }

    pub(crate) fn forwarding(&self) -> Result<&ForwardingConfig> {
        self.forwarding.as_ref().ok_or_else(|| Error::NoForwardingCapability(self.name.clone()))
    }

    /// Register a data-port interface and configure it inside the container. The interface must
    /// already live in the container's network namespace (the topology layer creates the veth
    /// pair and moves the endpoint in). Returns the assigned port.
    pub fn add_intf(&mut self, intf: Intf, port: Option<u16>) -> Result<u16> {
        if intf.is_effective() {
            if let Some(mac) = &intf.mac {
                self.backing.exec(&format!("ip link set {} address {}", intf.name, mac))?;
            }
            match &intf.ip {
                Some(ip) => self.backing.exec(&format!(
                    "ifconfig {} {} netmask {} up",
                    intf.name,
                    ip.addr,
                    ip.repr_mask()
                ))?,
                None => self.backing.exec(&format!("ip link set {} up", intf.name))?,
            };
        }
        Ok(self.registry.add(intf, port))
    }

    /// Register a VRF and create its kernel device, together with the companion bridge that L3
    /// overlay devices are enslaved to. The VRF id doubles as its kernel routing table.
    pub fn add_vrf(&mut self, name: &str, table_id: u32) -> Result<Outcome> {
        let outcome = self.vrfs.add_vrf(name, table_id, table_id)?;
        self.backing.exec(&format!("ip link add {} type vrf table {}", name, table_id))?;
        self.backing.exec(&format!("ip link set {} up", name))?;
        self.backing.exec(&format!("ip link add {}-br type bridge", name))?;
        self.backing.exec(&format!("ip link set {}-br master {} addrgenmode none", name, name))?;
        self.backing.exec(&format!("ip link set {}-br up", name))?;
        Ok(outcome)
    }

    /// Add an L2 overlay to a VRF: a bridge `br<vni>` holding the broadcast domain, and a vxlan
    /// device `vxlan<vni>` tunnelling it between the loopbacks. The bridge is registered as an
    /// internal interface and takes part in forwarding-table provisioning through the VRF model
    /// only.
    pub fn add_l2_vni(&mut self, vni: u32, bridge_ip: IpAddr, vrf: &str) -> Result<()> {
        self.vrfs.add_l2_vni(vrf, vni)?;
        let devname = format!("vxlan{}", vni);
        let brname = format!("br{}", vni);

        self.backing.exec(&format!("ip link add {} type bridge", brname))?;
        self.backing.exec(&format!("ip link set {} addrgenmode none", brname))?;
        self.backing.exec(&format!("ebtables -t filter -A INPUT -i {} -j DROP", devname))?;
        self.backing.exec(&format!("ebtables -t filter -A INPUT -i {} -j DROP", brname))?;
        self.backing.exec(&format!(
            "ip link add {} type vxlan local {} dstport 4789 id {} nolearning",
            devname, self.loopback.addr, vni
        ))?;
        self.backing
            .exec(&format!("ip link set {} master {} addrgenmode none", devname, brname))?;
        self.backing.exec(&format!(
            "ip link set {} type bridge_slave neigh_suppress off learning off",
            devname
        ))?;
        self.backing.exec(&format!("ip link set {} up", devname))?;
        self.backing.exec(&format!("ip link set {} up", brname))?;

        let mut bridge = Intf::internal(brname);
        bridge.mac = Some(ip_to_mac(&bridge_ip.addr)?);
        bridge.ip = Some(bridge_ip);
        bridge.set_vrf(vrf);
        bridge.set_bdi(vni);
        self.registry.add(bridge, None);
        Ok(())
    }

    /// Add the L3 overlay of a VRF: a vxlan device enslaved to the VRF's companion bridge, with
    /// neighbor suppression for routed traffic.
    pub fn add_l3_vni(&mut self, vni: u32, vrf: &str) -> Result<Outcome> {
        let outcome = self.vrfs.add_l3_vni(vrf, vni)?;
        let devname = format!("vxlan{}", vni);
        self.backing.exec(&format!(
            "ip link add {} type vxlan local {} id {} dstport 4789 nolearning",
            devname, self.loopback.addr, vni
        ))?;
        self.backing
            .exec(&format!("ip link set {} master {}-br addrgenmode none", devname, vrf))?;
        self.backing.exec(&format!(
            "ip link set {} type bridge_slave neigh_suppress on learning off",
            devname
        ))?;
        self.backing.exec(&format!("ip link set {} up", devname))?;
        Ok(outcome)
    }

    /// Attach an interface to the broadcast domain of an L2 overlay. The interface inherits the
    /// VRF and bridge-domain index of the overlay bridge; a previous attachment is dissolved.
    /// Returns the bridge domain the interface was attached to before, if any.
    pub fn attach_intf_to_l2_vni(&mut self, intf_name: &str, vni: u32) -> Result<Option<u32>> {
        let brname = format!("br{}", vni);
        let vrf = self
            .registry
            .get(&brname)
            .ok_or_else(|| Error::UnknownBridgeDomain(vni))?
            .vrf()
            .to_string();
        {
            let intf = self
                .registry
                .get_mut(intf_name)
                .ok_or_else(|| Error::UnknownInterface(intf_name.to_string()))?;
            intf.set_vrf(vrf);
            intf.set_bdi(vni);
        }
        let previous = self.vrfs.attach(vni, intf_name)?;

        self.backing.exec(&format!("ip link set {} down", intf_name))?;
        self.backing
            .exec(&format!("ip link set {} master {} addrgenmode none", intf_name, brname))?;
        self.backing.exec(&format!("ip link set {} up", intf_name))?;
        if self.forwarding.is_some() {
            // the engine owns bridged traffic on this port, the kernel bridge must not see it
            self.backing
                .exec(&format!("ebtables -t filter -A FORWARD -i {} -p ip -j DROP", intf_name))?;
            self.backing
                .exec(&format!("ebtables -t filter -A INPUT -i {} -p ip -j DROP", intf_name))?;
        }
        Ok(previous)
    }

    /// Append a routing configuration line (see [`RoutingConfig::add`])
    pub fn add_routing_config(
        &mut self,
        protocol: Option<Protocol>,
        line: impl Into<String>,
    ) -> Result<()> {
        match self.routing.as_mut() {
            Some(routing) => {
                routing.add(protocol, line);
                Ok(())
            }
            None => Err(Error::NoRoutingCapability(self.name.clone())),
        }
    }

    /// Append a drop rule to the ingress ACL
    pub fn add_acl(&mut self, entry: AclEntry) {
        self.acl.push(entry);
    }

    /// Append destination-MAC rewrite entries for remote subnets. Batches accumulate; they are
    /// never overwritten.
    pub fn add_subnet_entries(&mut self, entries: Vec<(String, String)>) {
        self.subnet_entries.extend(entries);
    }

    /// Set the fault-report collector address the control-plane agents report to
    pub fn set_admin_config(&mut self, admin: AdminConfig) {
        self.admin = Some(admin);
    }

    /// Stop and remove the node's container. A failure of either call is logged but not
    /// propagated; the node counts as torn down either way.
    pub fn stop(&mut self) {
        if let Err(e) = self.backing.stop() {
            warn!("[{}] cannot stop container: {}", self.name, e);
        }
        if let Err(e) = self.backing.remove() {
            warn!("[{}] cannot remove container: {}", self.name, e);
        }
    }
}
