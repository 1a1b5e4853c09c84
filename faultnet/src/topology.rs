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

//! Topology descriptor export for downstream diagnosis tooling.

use crate::Result;

use serde::Serialize;
use std::path::Path;

/// Role of a node in the exported descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A forwarding device
    Switch,
    /// An end host
    Host,
}

/// One node of the descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopoNode {
    /// Node name
    pub name: String,
    /// Loopback or management address
    pub ip: String,
    /// Role of the node
    pub kind: NodeKind,
}

/// One link of the descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopoLink {
    /// First endpoint (node name)
    pub a: String,
    /// Address of the first endpoint on the link
    pub ip_a: String,
    /// Second endpoint (node name)
    pub b: String,
    /// Address of the second endpoint on the link
    pub ip_b: String,
}

/// Collects nodes and links while the topology is built and writes them out as a JSON
/// descriptor. Registering a node name twice keeps the last registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopologyWriter {
    nodes: Vec<TopoNode>,
    links: Vec<TopoLink>,
}

impl TopologyWriter {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node
    pub fn add_node(&mut self, name: impl Into<String>, ip: impl Into<String>, kind: NodeKind) {
        let node = TopoNode { name: name.into(), ip: ip.into(), kind };
        if let Some(existing) = self.nodes.iter_mut().find(|n| n.name == node.name) {
            *existing = node;
        } else {
            self.nodes.push(node);
        }
    }

    /// Register a link between two nodes, carrying the endpoint addresses
    pub fn add_link(
        &mut self,
        a: impl Into<String>,
        ip_a: impl Into<String>,
        b: impl Into<String>,
        ip_b: impl Into<String>,
    ) {
        self.links.push(TopoLink { a: a.into(), ip_a: ip_a.into(), b: b.into(), ip_b: ip_b.into() });
    }

    /// Render the descriptor as pretty-printed JSON
    pub fn render(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the descriptor to a file
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.render()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_nodes_keep_the_last_registration() {
        let mut topo = TopologyWriter::new();
        topo.add_node("r1", "192.168.19.2", NodeKind::Host);
        topo.add_node("r1", "192.168.19.2", NodeKind::Switch);
        let rendered = topo.render().unwrap();
        assert_eq!(rendered.matches("\"r1\"").count(), 1);
        assert!(rendered.contains("\"switch\""));
    }

    #[test]
    fn descriptor_shape() {
        let mut topo = TopologyWriter::new();
        topo.add_node("r1", "192.168.19.2", NodeKind::Switch);
        topo.add_node("h1", "10.0.1.2", NodeKind::Host);
        topo.add_link("r1", "10.0.1.1/24", "h1", "10.0.1.2/24");
        let parsed: serde_json::Value = serde_json::from_str(&topo.render().unwrap()).unwrap();
        assert_eq!(parsed["nodes"][0]["name"], "r1");
        assert_eq!(parsed["nodes"][1]["kind"], "host");
        assert_eq!(parsed["links"][0]["b"], "h1");
        assert_eq!(parsed["links"][0]["ip_a"], "10.0.1.1/24");
        assert_eq!(parsed["links"][0]["ip_b"], "10.0.1.2/24");
    }
}
