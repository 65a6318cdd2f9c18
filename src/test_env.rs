// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::BurstParameters;
use crate::credentials::EnvCredentials;
use crate::engine::ComputeEngineBurst;
use crate::terraform::{Provisioner, ToolOutput, Verb};

/// The plan templates shipped in this repository.
pub fn repo_plans_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("plans")
}

/// A provisioner that runs nothing. It records every invocation and answers with exit code 0,
/// unless told to fail a verb with some other code.
///
/// Clones share their records, so a test can keep one clone while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvisioner {
    calls: Arc<Mutex<Vec<(Verb, PathBuf)>>>,
    exit_codes: Arc<Mutex<HashMap<String, i32>>>,
}

impl ScriptedProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later invocation of `verb` ("init", "plan", "apply", "destroy") exit `code`.
    pub fn exit_with(self, verb: &str, code: i32) -> Self {
        self.exit_codes
            .lock()
            .unwrap()
            .insert(verb.to_string(), code);
        self
    }

    pub fn calls(&self) -> Vec<Verb> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(verb, _)| verb.clone())
            .collect()
    }

    /// Names of the verbs invoked, in order.
    pub fn verbs(&self) -> Vec<String> {
        self.calls().iter().map(|verb| verb.to_string()).collect()
    }

    pub fn working_dirs(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, dir)| dir.clone())
            .collect()
    }
}

impl Provisioner for ScriptedProvisioner {
    fn invoke(&self, verb: &Verb, working_dir: &Path) -> io::Result<ToolOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((verb.clone(), working_dir.to_path_buf()));
        let code = self
            .exit_codes
            .lock()
            .unwrap()
            .get(&verb.to_string())
            .copied()
            .unwrap_or(0);
        Ok(ToolOutput::with_code(code))
    }
}

/// A TestEnvironment holds a private scratch directory for one test, with the secrets and plan
/// templates a burst needs. The directory is removed when the environment is dropped.
pub struct TestEnvironment {
    dir: tempfile::TempDir,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnvironment {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("burst-test-")
            .tempdir()
            .unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `name` in the private directory.
    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn working_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Parameters for an isolated burst of project "p".
    pub fn isolated_params(&self) -> BurstParameters {
        let mut params = BurstParameters::new("p");
        params.isolated_burst = true;
        params.terraform_dir = Some(self.working_root());
        params.plans_dir = Some(repo_plans_dir());
        params
    }

    /// Parameters for a burst of project "p" that joins a local cluster led by 10.0.0.1:30093.
    pub fn joined_params(&self) -> BurstParameters {
        let mut params = self.isolated_params();
        params.isolated_burst = false;
        params.lead_host = Some("10.0.0.1".to_string());
        params.lead_port = Some(30093);
        params.lead_hostnames = Some("gffw-login-001,gffw-compute-a-[001-003]".to_string());
        params.curve_cert = Some(self.write("curve.cert", b"curve\n    secret-key = \"s3cret\"\n"));
        params.munge_key = Some(self.write("munge.key", &[0xde, 0xad, 0xbe, 0xef]));
        params
    }

    /// An engine for `params` with credentials available, driving `provisioner`.
    pub fn engine(
        &self,
        params: BurstParameters,
        provisioner: &ScriptedProvisioner,
    ) -> ComputeEngineBurst {
        let credentials = EnvCredentials::with_location(Some(self.write("key.json", b"{}")));
        ComputeEngineBurst::new(params, Box::new(credentials), Box::new(provisioner.clone()))
    }
}
