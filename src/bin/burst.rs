// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use burst_lib::commands::{self, Cli};

/// The burst binary provisions and tears down burst clusters.
fn main() {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("BURST_LOG", default_level))
        .init();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
