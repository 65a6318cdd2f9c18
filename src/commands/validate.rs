// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::commands::{handled_error, Cli, HandledResult};

pub fn validate(cli: &Cli) -> HandledResult<()> {
    let mut params = cli.params()?;
    if !params.check() {
        return handled_error();
    }

    println!("project:  {}", params.project);
    println!("cluster:  {}", params.cluster_name);
    println!(
        "mode:     {}",
        if params.isolated_burst {
            "isolated"
        } else {
            "joined"
        }
    );
    println!(
        "plan:     {} ({})",
        params.terraform_plan_name,
        params.plan_template_dir().display()
    );
    match params.working_root() {
        Some(root) => println!("workdir:  {}", root.display()),
        None => println!("workdir:  (temporary, created by run)"),
    }
    if let Some(hosts) = crate::bootstrap::resource_hostlist(&params) {
        println!("hosts:    {hosts}");
    }
    Ok(())
}
