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

//! # Docker Daemon Handle

use crate::types::*;
use crate::{Error, Result};

use isahc::prelude::*;

use std::path::Path;
use std::process::Command;

/// # Docker Daemon Handle
///
/// Handle of a Docker daemon, reachable over its HTTP API. Exec sessions are created with a TTY,
/// so the returned output is the raw byte stream of the command, without stream multiplexing.
/// File transfer into a container uses the `docker` CLI (`docker cp`), because the archive
/// endpoint of the API requires tar framing.
#[derive(Debug, PartialEq, Clone)]
pub struct DockerServer {
    address: String,
    version: String,
    api_version: String,
}

impl DockerServer {
    /// Create a new instance of a daemon handle
    pub fn new(address: impl AsRef<str>, port: u32) -> Result<Self> {
        let address = format!("http://{}:{}", address.as_ref(), port);
        let version_addr = format!("{}/version", address);
        let v: VersionResponse = serde_json::from_str(&isahc::get(&version_addr)?.text()?)?;
        Ok(Self {
            address,
            version: v.version,
            api_version: v.api_version,
        })
    }

    /// Get the daemon version
    pub fn version(&self) -> &str {
        self.version.as_ref()
    }

    /// Get the API version of the daemon
    pub fn api_version(&self) -> &str {
        self.api_version.as_ref()
    }

    /// List all containers (including stopped ones)
    pub fn get_containers(&self) -> Result<Vec<ContainerSummary>> {
        Ok(serde_json::from_str(
            &self.request_get("containers/json?all=true")?,
        )?)
    }

    /// Create a new container from an image. The container is created privileged, with a TTY and
    /// without any network attached: all interfaces are provisioned later by moving veth
    /// endpoints into its namespace.
    pub fn create_container(
        &self,
        name: impl AsRef<str>,
        image: impl AsRef<str>,
    ) -> Result<CreatedContainer> {
        Ok(serde_json::from_str(&self.request_post(
            format!("containers/create?name={}", name.as_ref()),
            format!(
                "{{ \"Image\": \"{}\", \"Tty\": true, \"OpenStdin\": true, \
                 \"HostConfig\": {{ \"Privileged\": true, \"NetworkMode\": \"none\" }} }}",
                image.as_ref()
            ),
        )?)?)
    }

    /// Inspect a container
    pub fn inspect_container(&self, id: impl AsRef<str>) -> Result<ContainerDetails> {
        Ok(serde_json::from_str(
            &self.request_get(format!("containers/{}/json", id.as_ref()))?,
        )?)
    }

    /// Start a container
    pub fn start_container(&self, id: impl AsRef<str>) -> Result<()> {
        self.request_post(
            format!("containers/{}/start", id.as_ref()),
            String::from(""),
        )?;
        Ok(())
    }

    /// Stop a container
    pub fn stop_container(&self, id: impl AsRef<str>) -> Result<()> {
        self.request_post(
            format!("containers/{}/stop", id.as_ref()),
            String::from(""),
        )?;
        Ok(())
    }

    /// Remove a container, killing it if it is still running
    pub fn remove_container(&self, id: impl AsRef<str>) -> Result<()> {
        self.request_delete(format!("containers/{}?force=true", id.as_ref()))
    }

    /// Returns true if the container is currently running
    pub fn is_running(&self, id: impl AsRef<str>) -> Result<bool> {
        Ok(self.inspect_container(id)?.state.running)
    }

    /// Returns the host PID of the container init process. The PID identifies the network
    /// namespace of the container (`ip link set <dev> netns <pid>`).
    pub fn container_pid(&self, id: impl AsRef<str>) -> Result<u32> {
        Ok(self.inspect_container(id)?.state.pid)
    }

    /// Execute a command inside a running container with `/bin/sh -c`, block until it finishes,
    /// and return the combined output.
    pub fn exec(&self, id: impl AsRef<str>, cmd: impl AsRef<str>) -> Result<String> {
        let exec_id = self.create_exec(id, cmd)?;
        self.request_post(
            format!("exec/{}/start", exec_id),
            String::from("{ \"Detach\": false, \"Tty\": true }"),
        )
    }

    /// Execute a command inside a running container without waiting for its completion. Used to
    /// launch long-running background processes.
    pub fn exec_detached(&self, id: impl AsRef<str>, cmd: impl AsRef<str>) -> Result<()> {
        let exec_id = self.create_exec(id, cmd)?;
        self.request_post(
            format!("exec/{}/start", exec_id),
            String::from("{ \"Detach\": true, \"Tty\": true }"),
        )?;
        Ok(())
    }

    /// Copy a local file into the container, at the given absolute path.
    pub fn copy_file(
        &self,
        id: impl AsRef<str>,
        local: impl AsRef<Path>,
        remote: impl AsRef<str>,
    ) -> Result<()> {
        let output = Command::new("docker")
            .arg("cp")
            .arg(local.as_ref())
            .arg(format!("{}:{}", id.as_ref(), remote.as_ref()))
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::CopyFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }

    fn create_exec(&self, id: impl AsRef<str>, cmd: impl AsRef<str>) -> Result<String> {
        let escaped = cmd.as_ref().replace('\\', "\\\\").replace('"', "\\\"");
        let exec: ExecCreated = serde_json::from_str(&self.request_post(
            format!("containers/{}/exec", id.as_ref()),
            format!(
                "{{ \"AttachStdout\": true, \"AttachStderr\": true, \"Tty\": true, \
                 \"Cmd\": [\"/bin/sh\", \"-c\", \"{}\"] }}",
                escaped
            ),
        )?)?;
        Ok(exec.id)
    }

    fn request_get(&self, key: impl AsRef<str>) -> Result<String> {
        let addr = format!("{}/{}", self.address, key.as_ref());
        self.handle_response(isahc::get(&addr)?)
    }

    fn request_post(&self, key: impl AsRef<str>, data: String) -> Result<String> {
        let addr = format!("{}/{}", self.address, key.as_ref());
        let request = isahc::http::Request::post(&addr)
            .header("Content-Type", "application/json")
            .body(data)
            .map_err(|e| Error::ResponseError(0, e.to_string()))?;
        self.handle_response(isahc::send(request)?)
    }

    fn request_delete(&self, key: impl AsRef<str>) -> Result<()> {
        let addr = format!("{}/{}", self.address, key.as_ref());
        self.handle_response(isahc::delete(&addr)?).map(|_| ())
    }

    fn handle_response(&self, mut response: Response<Body>) -> Result<String> {
        let status = response.status();
        let text = response.text()?;
        if status.is_success() {
            return Ok(text);
        }
        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(e) => Err(Error::DockerError {
                status: status.as_u16(),
                message: e.message,
            }),
            Err(_) => Err(Error::ResponseError(status.as_u16(), text)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TEST_CONTAINER_NAME: &str = "FaultnetTestContainer";

    #[test]
    fn new_server() {
        let server = match DockerServer::new("localhost", 2375) {
            Ok(s) => s,
            Err(_) => return, // skip the test
        };
        assert!(!server.version().is_empty());
    }

    #[test]
    fn list_containers() {
        let server = match DockerServer::new("localhost", 2375) {
            Ok(s) => s,
            Err(_) => return, // skip the test
        };
        server.get_containers().unwrap();
    }

    #[test]
    fn create_start_stop_remove() {
        let server = match DockerServer::new("localhost", 2375) {
            Ok(s) => s,
            Err(_) => return, // skip the test
        };
        delete_test_container(&server, TEST_CONTAINER_NAME);
        let container = server
            .create_container(TEST_CONTAINER_NAME, "ubuntu:trusty_v2")
            .unwrap();
        assert!(!server.is_running(&container.id).unwrap());
        server.start_container(&container.id).unwrap();
        assert!(server.is_running(&container.id).unwrap());
        assert!(server.container_pid(&container.id).unwrap() > 0);
        let output = server.exec(&container.id, "echo hello").unwrap();
        assert!(output.contains("hello"));
        server.stop_container(&container.id).unwrap();
        server.remove_container(&container.id).unwrap();
    }

    fn delete_test_container(server: &DockerServer, name: &'static str) {
        if let Some(container) = server
            .get_containers()
            .unwrap()
            .into_iter()
            .find(|c| c.has_name(name))
        {
            server.remove_container(container.id).unwrap();
        }
    }
}
