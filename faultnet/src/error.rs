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

//! Module containing all error types

use crate::node::sequencer::Stage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error propagated from the container runtime
    #[error("Container Runtime Error: {0}")]
    Docker(#[from] docker::Error),
    /// IO Error
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Cannot serialize: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed IPv4 address or prefix
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),
    /// A node name must end in a numeric index (the index selects the loopback address)
    #[error("Node name carries no numeric index: {0}")]
    InvalidNodeName(String),
    /// No more free host addresses in the subnet
    #[error("Subnet {0} is exhausted")]
    SubnetExhausted(String),
    /// An explicitly assigned address lies outside the subnet
    #[error("Address {addr} lies outside of subnet {subnet}")]
    AddressOutsideSubnet {
        /// the requested address
        addr: String,
        /// the subnet it was requested from
        subnet: String,
    },
    /// A host-side `ip` command failed
    #[error("Link command `{cmd}` failed: {stderr}")]
    LinkCommand {
        /// the command that was executed
        cmd: String,
        /// its standard error output
        stderr: String,
    },
    /// The interface is not registered on the node
    #[error("Unknown interface: {0}")]
    UnknownInterface(String),
    /// The interface has no MAC address, but one is required for table provisioning
    #[error("Interface {0} has no MAC address")]
    MissingMac(String),
    /// The VRF is not registered on the node
    #[error("Unknown VRF: {0}")]
    UnknownVrf(String),
    /// The VRF already exists and the overwrite policy rejects duplicates
    #[error("VRF {0} already exists")]
    VrfExists(String),
    /// The VRF already owns an L3 VNI and the overwrite policy rejects duplicates
    #[error("VRF {vrf} already owns L3 VNI {vni}")]
    L3VniExists {
        /// the VRF
        vrf: String,
        /// the L3 VNI it already owns
        vni: u32,
    },
    /// The VNI is already associated with another VRF
    #[error("VNI {vni} is already owned by VRF {vrf}")]
    VniInUse {
        /// the VNI
        vni: u32,
        /// the VRF owning it
        vrf: String,
    },
    /// No bridge domain exists for the given index
    #[error("Unknown bridge domain: {0}")]
    UnknownBridgeDomain(u32),
    /// The operation requires the routing capability
    #[error("Node {0} has no routing capability")]
    NoRoutingCapability(String),
    /// The operation requires the forwarding capability
    #[error("Node {0} has no forwarding capability")]
    NoForwardingCapability(String),
    /// The forwarding pipeline description does not exist
    #[error("Invalid pipeline JSON file: {0}")]
    MissingPipeline(PathBuf),
    /// Starting a report agent requires the report-collector address
    #[error("Node {0} has no admin/report configuration")]
    MissingAdminConfig(String),
    /// A startup stage was invoked out of order
    #[error("Node {node}: stage {found} cannot run, expected {expected}")]
    StageOrder {
        /// the node
        node: String,
        /// the stage the node must be in
        expected: Stage,
        /// the stage the node is actually in
        found: Stage,
    },
    /// The forwarding engine kept rejecting a table batch
    #[error("Node {node}: installing the {table} table failed after {attempts} attempts: {last_output}")]
    TableInstall {
        /// the node
        node: String,
        /// the rejected table category
        table: String,
        /// number of attempts made
        attempts: usize,
        /// last output of the engine administration tool
        last_output: String,
    },
    /// An auxiliary agent never signalled readiness
    #[error("Node {node}: agent {agent} did not become ready (marker {marker})")]
    AgentTimeout {
        /// the node
        node: String,
        /// the agent that timed out
        agent: String,
        /// the readiness marker file that was polled
        marker: String,
    },
    /// A lookup file contains a malformed line
    #[error("Cannot parse {file}: bad line `{line}`")]
    ParseLine {
        /// the file being parsed
        file: String,
        /// the offending line
        line: String,
    },
}

/// Faultnet Result type
pub type Result<T> = core::result::Result<T, Error>;
