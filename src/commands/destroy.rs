// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;

use crate::{
    commands::{engine, Cli, Handle, HandledResult},
    engine::BurstPlugin,
};

#[derive(Args, Debug, Clone)]
pub struct DestroyArgs {
    /// Cluster to destroy; all known clusters when omitted.
    #[arg()]
    name: Option<String>,
}

pub fn destroy(cli: &Cli, args: &DestroyArgs) -> HandledResult<()> {
    let mut engine = engine(cli)?;
    engine
        .cleanup(args.name.as_deref())
        .handle_err(|e| eprintln!("Could not destroy: {e}"))
}
