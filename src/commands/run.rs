// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;
use log::error;

use crate::{
    commands::{engine, handled_error, Cli, Handle, HandledResult},
    engine::{BurstPlugin, BurstRequest},
    jobs::JobFile,
};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Request a burst of this many nodes instead of sizing it from jobs.
    #[arg(short, long)]
    nodes: Option<u32>,

    /// Number of tasks the requested nodes are for.
    #[arg(short, long, requires = "nodes")]
    tasks: Option<u32>,

    /// TOML file listing the jobs to burst (`[[jobs]]` tables with id, nnodes and tasks).
    #[arg(short, long)]
    jobs: Option<String>,
}

pub fn run(cli: &Cli, args: &RunArgs) -> HandledResult<()> {
    let mut engine = engine(cli)?;

    if let Some(path) = &args.jobs {
        let file = JobFile::from_file(path)?;
        for job in file.jobs {
            let id = job.id.clone();
            if !engine.schedule(job) {
                eprintln!("Job {id} could not be scheduled to {}.", engine.name());
                return handled_error();
            }
        }
    }

    let request = args.nodes.map(|nodes| BurstRequest {
        nodes,
        tasks: args.tasks,
    });
    engine.run(request).handle_err(|e| error!("{e}"))?;

    if let Some(root) = engine.params().working_root() {
        println!(
            "Terraform configs and working directory are found at {}",
            root.display()
        );
    }
    Ok(())
}
