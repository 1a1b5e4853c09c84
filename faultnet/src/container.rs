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

//! Container runtime contract.
//!
//! The node lifecycle only needs five operations of the container runtime: copy a file in,
//! execute a command and block for its output, launch a background process, start/stop, and a
//! liveness check. Container creation and removal are owned by the topology layer, which hands a
//! [`ContainerBacking`] to every node it creates.

use crate::Result;

use docker::DockerServer;
use log::*;
use std::path::Path;

/// Operations the node lifecycle requires from the container runtime.
pub trait ContainerRuntime {
    /// Copy a local file to an absolute path inside the container
    fn copy_file(&self, container: &str, local: &Path, remote: &str) -> Result<()>;
    /// Execute a shell command inside the container, block until it finishes, return its output
    fn exec(&self, container: &str, cmd: &str) -> Result<String>;
    /// Launch a shell command inside the container without waiting for completion
    fn exec_background(&self, container: &str, cmd: &str) -> Result<()>;
    /// Start the container
    fn start(&self, container: &str) -> Result<()>;
    /// Stop the container
    fn stop(&self, container: &str) -> Result<()>;
    /// Remove the container
    fn remove(&self, container: &str) -> Result<()>;
    /// Returns true if the container is running
    fn is_running(&self, container: &str) -> Result<bool>;
}

impl ContainerRuntime for DockerServer {
    fn copy_file(&self, container: &str, local: &Path, remote: &str) -> Result<()> {
        Ok(DockerServer::copy_file(self, container, local, remote)?)
    }

    fn exec(&self, container: &str, cmd: &str) -> Result<String> {
        Ok(DockerServer::exec(self, container, cmd)?)
    }

    fn exec_background(&self, container: &str, cmd: &str) -> Result<()> {
        Ok(DockerServer::exec_detached(self, container, cmd)?)
    }

    fn start(&self, container: &str) -> Result<()> {
        Ok(DockerServer::start_container(self, container)?)
    }

    fn stop(&self, container: &str) -> Result<()> {
        Ok(DockerServer::stop_container(self, container)?)
    }

    fn remove(&self, container: &str) -> Result<()> {
        Ok(DockerServer::remove_container(self, container)?)
    }

    fn is_running(&self, container: &str) -> Result<bool> {
        Ok(DockerServer::is_running(self, container)?)
    }
}

/// # Container Backing
///
/// The container a node runs in: a runtime handle, the container reference, and the host PID of
/// the container init process (which identifies its network namespace).
pub struct ContainerBacking {
    runtime: Box<dyn ContainerRuntime>,
    container: String,
    pid: u32,
}

impl std::fmt::Debug for ContainerBacking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContainerBacking({})", self.container)
    }
}

impl ContainerBacking {
    /// Create a new backing from a runtime handle, a container reference and the container PID
    pub fn new(runtime: Box<dyn ContainerRuntime>, container: impl Into<String>, pid: u32) -> Self {
        Self { runtime, container: container.into(), pid }
    }

    /// The container reference
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Host PID of the container init process
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Execute a command inside the container and return its output
    pub fn exec(&self, cmd: &str) -> Result<String> {
        trace!("[{}] $ {}", self.container, cmd);
        self.runtime.exec(&self.container, cmd)
    }

    /// Launch a background process inside the container
    pub fn exec_background(&self, cmd: &str) -> Result<()> {
        trace!("[{}] $ {} (background)", self.container, cmd);
        self.runtime.exec_background(&self.container, cmd)
    }

    /// Copy a local file into the container
    pub fn copy_file(&self, local: &Path, remote: &str) -> Result<()> {
        trace!("[{}] copy {:?} -> {}", self.container, local, remote);
        self.runtime.copy_file(&self.container, local, remote)
    }

    /// Start the container
    pub fn start(&self) -> Result<()> {
        self.runtime.start(&self.container)
    }

    /// Stop the container
    pub fn stop(&self) -> Result<()> {
        self.runtime.stop(&self.container)
    }

    /// Remove the container
    pub fn remove(&self) -> Result<()> {
        self.runtime.remove(&self.container)
    }

    /// Returns true if the container is running
    pub fn is_running(&self) -> Result<bool> {
        self.runtime.is_running(&self.container)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory runtime for lifecycle tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Runtime that records every operation and answers `exec` from scripted responses. A script
    /// maps a command substring to a queue of outputs; the last output of a queue is sticky.
    /// Commands with no matching script return an empty string.
    pub struct MockRuntime {
        pub log: Rc<RefCell<Vec<String>>>,
        scripts: RefCell<Vec<(String, VecDeque<String>)>>,
    }

    impl MockRuntime {
        pub fn new() -> (Self, Rc<RefCell<Vec<String>>>) {
            let log = Rc::new(RefCell::new(Vec::new()));
            (Self { log: log.clone(), scripts: RefCell::new(Vec::new()) }, log)
        }

        pub fn script(&self, needle: &str, outputs: Vec<&str>) {
            self.scripts
                .borrow_mut()
                .push((needle.to_string(), outputs.into_iter().map(String::from).collect()));
        }
    }

    impl ContainerRuntime for MockRuntime {
        fn copy_file(&self, _container: &str, local: &Path, remote: &str) -> Result<()> {
            self.log.borrow_mut().push(format!("copy {} -> {}", local.display(), remote));
            Ok(())
        }

        fn exec(&self, _container: &str, cmd: &str) -> Result<String> {
            self.log.borrow_mut().push(format!("exec {}", cmd));
            let mut scripts = self.scripts.borrow_mut();
            for (needle, outputs) in scripts.iter_mut() {
                if cmd.contains(needle.as_str()) {
                    return Ok(if outputs.len() > 1 {
                        outputs.pop_front().unwrap()
                    } else {
                        outputs.front().cloned().unwrap_or_default()
                    });
                }
            }
            Ok(String::new())
        }

        fn exec_background(&self, _container: &str, cmd: &str) -> Result<()> {
            self.log.borrow_mut().push(format!("spawn {}", cmd));
            Ok(())
        }

        fn start(&self, _container: &str) -> Result<()> {
            self.log.borrow_mut().push("start".to_string());
            Ok(())
        }

        fn stop(&self, _container: &str) -> Result<()> {
            self.log.borrow_mut().push("stop".to_string());
            Ok(())
        }

        fn remove(&self, _container: &str) -> Result<()> {
            self.log.borrow_mut().push("remove".to_string());
            Ok(())
        }

        fn is_running(&self, _container: &str) -> Result<bool> {
            Ok(true)
        }
    }
}
