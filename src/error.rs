// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::PathBuf;

use thiserror::Error;

use crate::lifecycle::Phase;

pub type Result<T> = std::result::Result<T, BurstError>;

/// Errors that can occur while preparing, provisioning, or tearing down a burst cluster.
///
/// Validation and scheduling problems are normally reported as a `false` return and a log line;
/// these variants cover the failures that abort a burst attempt outright, plus the registry error
/// raised when cleanup is asked for a cluster that does not exist.
#[derive(Debug, Error)]
pub enum BurstError {
    #[error("burst parameters failed validation")]
    InvalidParameters,

    #[error("{0} is not set; cannot provision on Compute Engine")]
    MissingCredentials(&'static str),

    #[error("plan '{name}' does not exist at {}", .path.display())]
    UnknownPlan { name: String, path: PathBuf },

    #[error("could not read {what} '{}': {source}", .path.display())]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("boot script template: {0}")]
    Render(#[from] crate::bootstrap::RenderError),

    #[error("could not prepare working directory '{}': {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not run terraform {verb} in '{}': {source}", .dir.display())]
    Spawn {
        verb: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A provisioning step whose failure aborts the burst (init or apply).
    #[error("error running terraform {verb} for plan {plan} in {}, exit code {code}", .dir.display())]
    Tool {
        verb: String,
        plan: String,
        dir: PathBuf,
        code: i32,
    },

    #[error("cluster {0} is already provisioned; destroy it before bursting again")]
    ClusterExists(String),

    #[error("{0} is not a known cluster")]
    UnknownCluster(String),

    #[error("statefile '{}': {message}", .path.display())]
    State { path: PathBuf, message: String },

    #[error("invalid lifecycle transition {from:?} -> {to:?}")]
    Transition { from: Phase, to: Phase },
}

impl BurstError {
    /// True for the registry error raised by cleanup of a cluster name that was never registered.
    pub fn is_unknown_cluster(&self) -> bool {
        matches!(self, BurstError::UnknownCluster(_))
    }
}
