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

//! Interface data structure owned by a node.

use crate::subnet::IpAddr;

use std::fmt;

/// Default VRF every interface starts out in
pub const DEFAULT_VRF: &str = "default";

/// # Interface
///
/// One network interface of a node. Data-port interfaces are created as host-side veth endpoints
/// and moved into the container; internal interfaces (overlay bridges, vxlan devices) live inside
/// the container from the start and are excluded from forwarding-table provisioning.
#[derive(Debug, Clone, PartialEq)]
pub struct Intf {
    /// Name of the interface, unique per node
    pub name: String,
    /// MAC address
    pub mac: Option<String>,
    /// IPv4 address
    pub ip: Option<IpAddr>,
    vrf: String,
    bdi: Option<u32>,
    internal: bool,
}

impl Intf {
    /// Create a new data-port interface
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac: None,
            ip: None,
            vrf: DEFAULT_VRF.to_string(),
            bdi: None,
            internal: false,
        }
    }

    /// Create a new data-port interface with addresses assigned
    pub fn with_addr(name: impl Into<String>, ip: IpAddr, mac: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac: Some(mac.into()),
            ip: Some(ip),
            vrf: DEFAULT_VRF.to_string(),
            bdi: None,
            internal: false,
        }
    }

    /// Create an internal helper interface (overlay plumbing, not a data port)
    pub fn internal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac: None,
            ip: None,
            vrf: DEFAULT_VRF.to_string(),
            bdi: None,
            internal: true,
        }
    }

    /// The VRF the interface belongs to
    pub fn vrf(&self) -> &str {
        &self.vrf
    }

    /// Move the interface into a VRF
    pub fn set_vrf(&mut self, vrf: impl Into<String>) {
        self.vrf = vrf.into();
    }

    /// The bridge-domain index, once attached to an L2 overlay
    pub fn bdi(&self) -> Option<u32> {
        self.bdi
    }

    /// Attach the interface to a bridge domain
    pub fn set_bdi(&mut self, bdi: u32) {
        self.bdi = Some(bdi);
    }

    /// Returns true if the interface is a data port eligible for table provisioning
    pub fn is_effective(&self) -> bool {
        !self.internal
    }
}

impl fmt::Display for Intf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
