// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::{Path, PathBuf};

/// Something that can say whether cloud credentials are available for provisioning.
///
/// The engine is handed a provider when it is built instead of looking at the process
/// environment itself, so the check is the same for the whole life of the engine.
pub trait CredentialsProvider: std::fmt::Debug {
    /// Name of the binding the provider reads, used in diagnostics.
    fn binding(&self) -> &'static str;

    /// Location of the credentials, if present.
    fn location(&self) -> Option<&Path>;

    fn is_available(&self) -> bool {
        self.location().is_some()
    }
}

/// Credentials located through an environment variable, read once at construction.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: &'static str,
    location: Option<PathBuf>,
}

impl EnvCredentials {
    pub fn from_env() -> Self {
        Self::from_var(crate::CREDENTIALS_VAR)
    }

    pub fn from_var(var: &'static str) -> Self {
        EnvCredentials {
            var,
            location: std::env::var_os(var)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Credentials with an explicit location (or none), without touching the environment.
    pub fn with_location(location: Option<PathBuf>) -> Self {
        EnvCredentials {
            var: crate::CREDENTIALS_VAR,
            location,
        }
    }
}

impl CredentialsProvider for EnvCredentials {
    fn binding(&self) -> &'static str {
        self.var
    }

    fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}
