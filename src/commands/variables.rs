// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;
use log::error;

use crate::{
    bootstrap,
    commands::{handled_error, Cli, Handle, HandledResult},
    variables,
};

#[derive(Args, Debug, Clone)]
pub struct VariablesArgs {
    /// Total number of nodes the burst cluster should provide.
    #[arg(short, long)]
    nodes: u32,

    /// Print the curve certificate, munge key and boot scripts instead of hiding them.
    #[arg(long)]
    show_secrets: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Write the script to this file instead of stdout.
    #[arg(short, long)]
    output: Option<String>,
}

pub fn variables(cli: &Cli, args: &VariablesArgs) -> HandledResult<()> {
    let mut params = cli.params()?;
    if !params.check() {
        return handled_error();
    }

    let mut vars = variables::compile(&params, args.nodes).handle_err(|e| error!("{e}"))?;
    if params.is_joined() {
        let script = bootstrap::render_boot_script(&params).handle_err(|e| error!("{e}"))?;
        vars.set_compute_boot_script(&script);
    }
    if !args.show_secrets {
        vars = vars.redacted();
    }

    let json = vars.to_json().handle_err(|e| error!("{e}"))?;
    println!("{json}");
    Ok(())
}

pub fn render(cli: &Cli, args: &RenderArgs) -> HandledResult<()> {
    let mut params = cli.params()?;
    if !params.check() {
        return handled_error();
    }
    if params.isolated_burst {
        eprintln!("An isolated burst does not join the local cluster; there is nothing to render.");
        return handled_error();
    }

    let script = bootstrap::render_boot_script(&params).handle_err(|e| error!("{e}"))?;
    match &args.output {
        Some(path) => std::fs::write(path, script).handle_err(|e| {
            error!("Could not write boot script to '{path}': {e}");
        }),
        None => {
            print!("{script}");
            Ok(())
        }
    }
}
