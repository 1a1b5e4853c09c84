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

//! # Docker API Types

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct VersionResponse {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "ApiVersion")]
    pub api_version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ErrorResponse {
    pub message: String,
}

/// Handle of a freshly created container
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CreatedContainer {
    /// ID of the container
    #[serde(rename = "Id")]
    pub id: String,
    /// Warnings emitted during creation
    #[serde(rename = "Warnings", default)]
    pub warnings: Vec<String>,
}

/// Detailed container information, as reported by the inspect endpoint
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ContainerDetails {
    /// ID of the container
    #[serde(rename = "Id")]
    pub id: String,
    /// Name of the container (with the leading slash the daemon adds)
    #[serde(rename = "Name")]
    pub name: String,
    /// Runtime state of the container
    #[serde(rename = "State")]
    pub state: ContainerState,
}

/// Runtime state of a container
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ContainerState {
    /// Whether the container is currently running
    #[serde(rename = "Running")]
    pub running: bool,
    /// PID of the container init process on the host (0 when stopped)
    #[serde(rename = "Pid")]
    pub pid: u32,
    /// Status string (`created`, `running`, `exited`, ...)
    #[serde(rename = "Status")]
    pub status: String,
}

/// Entry of the container listing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ContainerSummary {
    /// ID of the container
    #[serde(rename = "Id")]
    pub id: String,
    /// All names of the container
    #[serde(rename = "Names")]
    pub names: Vec<String>,
    /// Image the container was created from
    #[serde(rename = "Image")]
    pub image: String,
    /// Status string
    #[serde(rename = "State")]
    pub state: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ExecCreated {
    #[serde(rename = "Id")]
    pub id: String,
}

impl ContainerSummary {
    /// Returns true if the listing entry matches the given (unprefixed) container name
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.trim_start_matches('/') == name)
    }
}
