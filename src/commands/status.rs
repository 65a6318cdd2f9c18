// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::Path;

use log::error;

use crate::{
    commands::{Cli, Handle, HandledResult},
    state::StateFile,
};

pub fn status(cli: &Cli) -> HandledResult<()> {
    let path = cli.statefile_path();
    let path = Path::new(&path);
    if !path.exists() {
        println!("No burst clusters.");
        return Ok(());
    }

    let clusters = StateFile::open_read_only(path)
        .and_then(|state| state.load())
        .handle_err(|e| error!("{e}"))?;
    if clusters.is_empty() {
        println!("No burst clusters.");
        return Ok(());
    }
    for cluster in clusters.iter() {
        println!("{cluster}");
    }
    Ok(())
}
