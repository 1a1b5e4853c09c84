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

use clap::{Parser, Subcommand};
use log::*;
use std::error::Error;

mod topologies;
use topologies::{build_ring, TopologyOptions};

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let args = CommandLineArguments::parse();

    let (size, bfd, opts) = match args.cmd {
        MainCommand::Triangle { opts } => (3, true, opts),
        MainCommand::Ring { size, opts } => (size, false, opts),
    };

    let mut nodes = build_ring(size, bfd, &opts)?;

    info!("starting {} nodes", nodes.len());
    for node in nodes.iter_mut() {
        node.start()?;
        info!("{} is {}", node.name(), node.stage());
    }

    if opts.keep {
        info!("leaving the topology running");
    } else {
        for node in nodes.iter_mut() {
            node.stop();
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(name = "faultnet", author = "Faultnet Developers")]
struct CommandLineArguments {
    /// Topology to emulate
    #[clap(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand, Debug)]
enum MainCommand {
    /// Three ASs peering pairwise over eBGP, with BFD detecting link failures
    #[clap(name = "triangle")]
    Triangle {
        #[clap(flatten)]
        opts: TopologyOptions,
    },
    /// N ASs connected in a ring
    #[clap(name = "ring")]
    Ring {
        /// Number of ASs
        #[clap(short = 'n', long, default_value = "4")]
        size: usize,
        #[clap(flatten)]
        opts: TopologyOptions,
    },
}
