// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod destroy;
pub mod run;
pub mod status;
pub mod validate;
pub mod variables;

use {
    destroy::DestroyArgs,
    run::RunArgs,
    variables::{RenderArgs, VariablesArgs},
};

use clap::{Parser, Subcommand};
use log::error;

use crate::{
    config::BurstParameters,
    credentials::{CredentialsProvider, EnvCredentials},
    engine::ComputeEngineBurst,
    state::StateFile,
    terraform::Terraform,
};

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub fn handled_error<T>() -> HandledResult<T> {
    HandledResult::Err(HandledError {})
}

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Burst overflow work to a Compute Engine cluster", long_about = None)]
pub struct Cli {
    /// Burst parameters (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// File recording the clusters that have been created.
    #[arg(long, global = true)]
    pub statefile: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Capture terraform output instead of streaming it.
    #[arg(long, global = true)]
    pub quiet_terraform: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the burst parameters.
    Validate,
    /// Print the variables that would be handed to the plan.
    Variables(VariablesArgs),
    /// Print the boot script for nodes joining the local cluster.
    Render(RenderArgs),
    /// Provision a burst cluster.
    Run(RunArgs),
    /// Destroy one or all burst clusters.
    Destroy(DestroyArgs),
    /// List the known burst clusters.
    Status,
}

impl Cli {
    pub fn config_path(&self) -> String {
        match &self.config {
            Some(path) => path.clone(),
            None => crate::default_config_path(),
        }
    }

    pub fn statefile_path(&self) -> String {
        match &self.statefile {
            Some(path) => path.clone(),
            None => crate::default_statefile_path(),
        }
    }

    pub fn params(&self) -> HandledResult<BurstParameters> {
        BurstParameters::from_file(&self.config_path())
    }
}

/// Build the engine described by the command line: parameters from the config file, credentials
/// from the environment, terraform from the parameters, and clusters from the statefile.
pub fn engine(cli: &Cli) -> HandledResult<ComputeEngineBurst> {
    let params = cli.params()?;
    let credentials = EnvCredentials::from_env();

    let mut terraform =
        Terraform::new(&params.terraform_binary()).capture_output(cli.quiet_terraform);
    if let Some(location) = credentials.location() {
        terraform = terraform.env(credentials.binding(), &location.to_string_lossy());
    }

    let statefile = cli.statefile_path();
    let state = StateFile::open(std::path::Path::new(&statefile))
        .handle_err(|e| error!("{e}"))?;

    ComputeEngineBurst::new(params, Box::new(credentials), Box::new(terraform))
        .with_state_file(state)
        .handle_err(|e| error!("{e}"))
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    match &cli.command {
        Commands::Validate => validate::validate(cli),
        Commands::Variables(args) => variables::variables(cli, args),
        Commands::Render(args) => variables::render(cli, args),
        Commands::Run(args) => run::run(cli, args),
        Commands::Destroy(args) => destroy::destroy(cli, args),
        Commands::Status => status::status(cli),
    }
}
