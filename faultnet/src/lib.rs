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

//! # Faultnet
//!
//! Faultnet emulates multi-AS networks out of containers for distributed fault diagnosis. Every
//! device is a container; routers run an off-the-shelf routing suite, and programmable routers
//! additionally run a P4 forwarding engine that the kernel control plane drives through a route
//! mediator.
//!
//! The heart of the library is the [`Node`]: a container backing composed with optional routing
//! and forwarding capabilities. Topology-building operations (interfaces, VRFs, VXLAN overlays,
//! ACLs) accumulate state on the node; starting the node runs a staged sequencer that wires the
//! internal interface pairs, launches the forwarding engine, installs the forwarding tables, and
//! brings up the control-plane agents.
//!
//! ```no_run
//! use faultnet::{AdminConfig, ForwardingConfig, Node, Protocol, RoutingConfig};
//! use faultnet::container::ContainerBacking;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = docker::DockerServer::new("localhost", 2375)?;
//!     let container = server.create_container("mn.r1", "faultnet/router")?.id;
//!     server.start_container(&container)?;
//!     let pid = server.container_pid(&container)?;
//!
//!     let backing = ContainerBacking::new(Box::new(server), container, pid);
//!     let mut fwd = ForwardingConfig::new("pipeline.json");
//!     fwd.runtime_api = Some("runtime_API.py".into());
//!     let mut r1 = Node::new("r1", backing)?
//!         .with_routing(RoutingConfig::new("frr"))?
//!         .with_forwarding(fwd)?;
//!     r1.add_routing_config(Some(Protocol::Bgpd), "router bgp 65001")?;
//!     r1.set_admin_config(AdminConfig::new("192.168.0.1", 9000));
//!     r1.start()?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

pub mod container;
mod error;
pub mod intf;
pub mod link;
pub mod node;
pub mod subnet;
pub mod topology;

pub use container::{ContainerBacking, ContainerRuntime};
pub use error::{Error, Result};
pub use intf::{Intf, DEFAULT_VRF};
pub use node::{
    AclEntry, AdminConfig, ForwardingConfig, Node, Outcome, OverwritePolicy, Protocol,
    RetryPolicy, RoutingConfig, Stage, VrfModel,
};
pub use subnet::{ip_to_mac, IpAddr, Subnet};
pub use topology::{NodeKind, TopologyWriter};
