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

//! Host-side veth link helper.
//!
//! Virtual links are veth pairs created in the host namespace and handed over to the containers
//! by moving each endpoint into the container's network namespace (identified by the PID of its
//! init process). Requires root.

use crate::{Error, Result};

use log::*;
use std::process::Command;

/// Create a veth pair in the host namespace, optionally setting the MAC address of both ends.
pub fn make_veth_pair(
    name_a: &str,
    name_b: &str,
    mac_a: Option<&str>,
    mac_b: Option<&str>,
) -> Result<()> {
    run(&["ip", "link", "add", name_a, "type", "veth", "peer", "name", name_b])?;
    if let Some(mac) = mac_a {
        run(&["ip", "link", "set", name_a, "address", mac])?;
    }
    if let Some(mac) = mac_b {
        run(&["ip", "link", "set", name_b, "address", mac])?;
    }
    debug!("created veth pair {} <-> {}", name_a, name_b);
    Ok(())
}

/// Move an interface from the host namespace into the network namespace of the process `pid`.
pub fn move_into_ns(ifname: &str, pid: u32) -> Result<()> {
    run(&["ip", "link", "set", ifname, "netns", &pid.to_string()])?;
    debug!("moved {} into namespace of pid {}", ifname, pid);
    Ok(())
}

/// Delete a host-side interface. Deleting one end of a veth pair removes its peer as well.
pub fn delete_link(ifname: &str) -> Result<()> {
    run(&["ip", "link", "del", ifname]).map(|_| ())
}

fn run(args: &[&str]) -> Result<String> {
    let output = Command::new(args[0]).args(&args[1..]).output()?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(Error::LinkCommand {
            cmd: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
