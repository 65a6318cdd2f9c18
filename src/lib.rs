// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod registry;
pub mod state;
pub mod terraform;
pub mod test_env;
pub mod variables;

pub use error::{BurstError, Result};

/// Name of the environment variable that must point at Google Cloud credentials before any burst
/// can be scheduled.
pub const CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

pub fn default_config_path() -> String {
    match std::env::var("BURST_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/burst/burst.toml".to_string(),
    }
}

pub fn default_statefile_path() -> String {
    match std::env::var("BURST_STATEFILE") {
        Ok(statefile) => statefile,
        Err(_) => "/var/lib/burst/burst.state".to_string(),
    }
}

/// Gets the directory holding the named provisioning plans (one subdirectory per plan).
pub fn default_plans_dir() -> String {
    match std::env::var("BURST_PLANS_DIR") {
        Ok(dir) => dir,
        Err(_) => "/usr/share/burst/plans".to_string(),
    }
}

pub fn default_terraform_binary() -> String {
    match std::env::var("BURST_TERRAFORM") {
        Ok(bin) => bin,
        Err(_) => "terraform".to_string(),
    }
}
