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

//! # Docker Engine API
//!
//! This is a very simple crate to interact with a local Docker daemon, creating, starting and
//! stopping containers, executing commands inside them, and copying files into them.
//!
//! ```no_run
//! use docker::DockerServer;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // connect to the daemon
//!     let server = match DockerServer::new("localhost", 2375) {
//!         Ok(s) => s,
//!         Err(e) => {
//!             eprintln!("Cannot connect to the daemon: {}", e);
//!             return Err(e.into());
//!         }
//!     };
//!
//!     // create and start a container
//!     let container = server.create_container("r1", "p4switch:v9")?;
//!     server.start_container(&container.id)?;
//!
//!     // run a command inside of it
//!     let output = server.exec(&container.id, "ip link show")?;
//!     println!("{}", output);
//!
//!     // tear it down again
//!     server.stop_container(&container.id)?;
//!     server.remove_container(&container.id)?;
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod server;
mod types;
pub use server::DockerServer;
pub use types::*;

use thiserror::Error;

/// # Docker Error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error during handling of the HTTP request
    #[allow(clippy::upper_case_acronyms)]
    #[error("HTTP Error: {0}")]
    HTTPError(#[from] isahc::Error),
    /// Cannot deserialize the response
    #[error("Cannot parse JSON response: {0}")]
    JsonError(#[from] serde_json::error::Error),
    /// IO Error
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    /// Error reported by the Docker daemon
    #[error("Docker Error: {status}: {message}")]
    DockerError {
        /// HTTP status code of the response
        status: u16,
        /// Error message from the daemon
        message: String,
    },
    /// HTTP Response Error
    #[error("HTTP Response Error: {0}. Message:\n{1}")]
    ResponseError(u16, String),
    /// The `docker cp` command failed (file transfer goes through the CLI)
    #[error("docker cp failed: {0}")]
    CopyFailed(String),
}

/// Docker Result type
type Result<T> = core::result::Result<T, Error>;
