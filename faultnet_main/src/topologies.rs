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

//! Demo topologies: one AS per router, eBGP peering along the links.

use faultnet::container::ContainerBacking;
use faultnet::{
    ip_to_mac, link, AdminConfig, ForwardingConfig, Intf, Node, NodeKind, Protocol,
    RoutingConfig, Subnet, TopologyWriter,
};

use clap::Args;
use docker::DockerServer;
use log::*;
use std::error::Error;
use std::path::PathBuf;

/// Options shared by all demo topologies
#[derive(Args, Debug)]
pub struct TopologyOptions {
    /// Docker daemon address
    #[clap(long, default_value = "localhost")]
    pub docker_host: String,
    /// Docker daemon port
    #[clap(long, default_value = "2375")]
    pub docker_port: u32,
    /// Container image of the routers
    #[clap(long, default_value = "localhost/p4switch-frr:v7")]
    pub image: String,
    /// Routing suite inside the image
    #[clap(long, default_value = "frr")]
    pub software: String,
    /// Compiled pipeline description; routers run plain FRR without it
    #[clap(long)]
    pub pipeline: Option<PathBuf>,
    /// Directory holding the control-plane agents (rt_mediator, runtime_API.py, switch_agent)
    #[clap(long)]
    pub agents: Option<PathBuf>,
    /// Address of the fault-report collector
    #[clap(long, default_value = "192.168.0.1")]
    pub admin_ip: String,
    /// Port of the fault-report collector
    #[clap(long, default_value = "9024")]
    pub admin_port: u16,
    /// Where to write the topology descriptor
    #[clap(long, default_value = "topology.json")]
    pub topology_file: PathBuf,
    /// Leave the containers running on exit
    #[clap(short = 'k', long)]
    pub keep: bool,
}

/// Build a ring of `size` routers, one AS each, with eBGP sessions on every link. With `bfd`,
/// every session additionally runs a BFD session to detect link failures. Returns the configured
/// (not yet started) nodes.
pub fn build_ring(size: usize, bfd: bool, opts: &TopologyOptions) -> Result<Vec<Node>, Box<dyn Error>> {
    let server = DockerServer::new(&opts.docker_host, opts.docker_port)?;
    info!("connected to docker {} (api {})", server.version(), server.api_version());

    let mut topo = TopologyWriter::new();
    let mut nodes = Vec::with_capacity(size);
    for i in 0..size {
        let node = make_router(&server, i, bfd, opts)?;
        topo.add_node(node.name(), node.loopback().addr.clone(), NodeKind::Switch);
        nodes.push(node);
    }

    // one subnet per ring segment
    for i in 0..size {
        let j = (i + 1) % size;
        if size == 2 && j < i {
            break;
        }
        let mut subnet = Subnet::new(format!("10.{}.0.0", i), 24)?;
        let ip_i = subnet.allocate()?;
        let ip_j = subnet.allocate()?;
        wire(&mut nodes, i, j, &ip_i, &ip_j)?;

        // eBGP over the new segment
        peer(&mut nodes[i], j + 1, &ip_j.addr, bfd)?;
        peer(&mut nodes[j], i + 1, &ip_i.addr, bfd)?;
        let prefix = subnet.network_prefix();
        nodes[i].add_routing_config(Some(Protocol::Bgpd), format!("network {}", prefix))?;
        nodes[j].add_routing_config(Some(Protocol::Bgpd), format!("network {}", prefix))?;
        topo.add_link(
            nodes[i].name().to_string(),
            ip_i.to_string(),
            nodes[j].name().to_string(),
            ip_j.to_string(),
        );
    }

    topo.write(&opts.topology_file)?;
    info!("wrote topology descriptor to {}", opts.topology_file.display());
    Ok(nodes)
}

fn make_router(
    server: &DockerServer,
    index: usize,
    bfd: bool,
    opts: &TopologyOptions,
) -> Result<Node, Box<dyn Error>> {
    let name = format!("r{}", index);
    let container = format!("mn.{}", name);
    let created = server.create_container(&container, &opts.image)?;
    server.start_container(&created.id)?;
    let pid = server.container_pid(&created.id)?;
    let backing = ContainerBacking::new(Box::new(server.clone()), created.id, pid);

    let mut routing = RoutingConfig::new(&opts.software);
    routing.add(None, "log file /tmp/frr.log debugging");
    routing.add(Some(Protocol::Bgpd), format!("router bgp {}", index + 1));
    if bfd {
        routing.add(Some(Protocol::Bfdd), "bfd");
    }
    let mut node = Node::new(name, backing)?.with_routing(routing)?;
    node.add_routing_config(
        Some(Protocol::Bgpd),
        format!("bgp router-id {}", node.loopback().addr),
    )?;
    node.add_routing_config(Some(Protocol::Bgpd), "no bgp ebgp-requires-policy")?;

    if let Some(pipeline) = &opts.pipeline {
        let mut fwd = ForwardingConfig::new(pipeline);
        if let Some(agents) = &opts.agents {
            fwd.mediator = Some(agents.join("rt_mediator.py"));
            fwd.runtime_api = Some(agents.join("runtime_API.py"));
            fwd.switch_agent = Some(agents.join("switch_agent.py"));
        }
        fwd.workdir = std::env::temp_dir();
        node = node.with_forwarding(fwd)?;
        node.set_admin_config(AdminConfig::new(&opts.admin_ip, opts.admin_port));
    }
    Ok(node)
}

/// Create the veth pair of one segment, hand the endpoints to the two containers and register
/// them with addresses derived from the segment subnet.
fn wire(
    nodes: &mut [Node],
    i: usize,
    j: usize,
    ip_i: &faultnet::IpAddr,
    ip_j: &faultnet::IpAddr,
) -> Result<(), Box<dyn Error>> {
    let name_i = format!("{}-eth{}", nodes[i].name(), nodes[i].registry().new_port());
    let name_j = format!("{}-eth{}", nodes[j].name(), nodes[j].registry().new_port());
    let mac_i = ip_to_mac(&ip_i.addr)?;
    let mac_j = ip_to_mac(&ip_j.addr)?;

    link::make_veth_pair(&name_i, &name_j, Some(&mac_i), Some(&mac_j))?;
    link::move_into_ns(&name_i, nodes[i].backing().pid())?;
    link::move_into_ns(&name_j, nodes[j].backing().pid())?;

    nodes[i].add_intf(Intf::with_addr(name_i, ip_i.clone(), mac_i), None)?;
    nodes[j].add_intf(Intf::with_addr(name_j, ip_j.clone(), mac_j), None)?;
    Ok(())
}

fn peer(node: &mut Node, remote_as: usize, neighbor: &str, bfd: bool) -> Result<(), Box<dyn Error>> {
    node.add_routing_config(
        Some(Protocol::Bgpd),
        format!("neighbor {} remote-as {}", neighbor, remote_as),
    )?;
    if bfd {
        for (protocol, line) in bfd_session(neighbor) {
            node.add_routing_config(protocol, line)?;
        }
    }
    debug!("{} peers with {} (AS {})", node.name(), neighbor, remote_as);
    Ok(())
}

/// Configuration lines of one BFD session: the BGP side registers the neighbor with BFD, the
/// bfdd side declares the peer with aggressive intervals.
fn bfd_session(neighbor: &str) -> Vec<(Option<Protocol>, String)> {
    vec![
        (Some(Protocol::Bgpd), format!("neighbor {} bfd", neighbor)),
        (Some(Protocol::Bfdd), format!("peer {}", neighbor)),
        (Some(Protocol::Bfdd), "no shutdown".to_string()),
        (Some(Protocol::Bfdd), "receive-interval 100".to_string()),
        (Some(Protocol::Bfdd), "transmit-interval 100".to_string()),
    ]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bfd_session_registers_both_sides() {
        let lines = bfd_session("10.0.1.2");
        assert_eq!(lines[0], (Some(Protocol::Bgpd), "neighbor 10.0.1.2 bfd".to_string()));
        assert_eq!(lines[1], (Some(Protocol::Bfdd), "peer 10.0.1.2".to_string()));
        assert!(lines.iter().any(|(_, l)| l == "receive-interval 100"));
        assert!(lines.iter().any(|(_, l)| l == "transmit-interval 100"));
    }
}
