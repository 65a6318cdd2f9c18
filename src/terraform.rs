// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! terraform.rs
//!
//! This module runs the provisioning tool against a plan working directory, and prepares those
//! working directories from the plan templates.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use log::debug;
use walkdir::WalkDir;

use crate::{variables::VariableSet, BurstError};

/// File the variables are written to inside a working directory. Terraform loads
/// `*.auto.tfvars.json` files on its own.
pub const VARIABLES_FILE: &str = "burst.auto.tfvars.json";

/// File the plan verb saves its plan to.
pub const PLAN_FILE: &str = "tfplan";

/// Operations that can be performed by the provisioning tool.
#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    Init,
    /// Compute a plan without refreshing state, saving it to `out` when given.
    Plan { out: Option<PathBuf> },
    /// Apply with auto-approval, planning inline instead of using a saved plan.
    Apply,
    /// Destroy everything in the working directory. `force` skips the interactive approval.
    Destroy { force: bool },
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Verb::Init => "init",
                Verb::Plan { .. } => "plan",
                Verb::Apply => "apply",
                Verb::Destroy { .. } => "destroy",
            }
        )
    }
}

impl Verb {
    /// Command line arguments, after the verb itself.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-input=false".to_string()];
        match self {
            Verb::Init => {}
            Verb::Plan { out } => {
                args.push("-no-color".to_string());
                args.push("-refresh=false".to_string());
                args.push("-detailed-exitcode".to_string());
                if let Some(out) = out {
                    args.push(format!("-out={}", out.display()));
                }
            }
            Verb::Apply => args.push("-auto-approve".to_string()),
            Verb::Destroy { force } => {
                if *force {
                    args.push("-auto-approve".to_string());
                }
            }
        }
        args
    }

    /// Whether `code` is a success for this verb. With `-detailed-exitcode`, plan exits 2 when the
    /// plan has changes to make.
    pub fn succeeded(&self, code: i32) -> bool {
        match self {
            Verb::Plan { .. } => code == 0 || code == 2,
            _ => code == 0,
        }
    }
}

/// What the provisioning tool did. `stdout` and `stderr` are empty when output was not captured.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn with_code(exit_code: i32) -> Self {
        ToolOutput {
            exit_code,
            ..Default::default()
        }
    }
}

/// The provisioning tool, as seen by the lifecycle driver. Each call blocks until the tool exits.
///
/// An `Err` means the tool could not be run at all; a tool that ran and failed is an `Ok` with a
/// non-zero exit code.
pub trait Provisioner: std::fmt::Debug {
    fn invoke(&self, verb: &Verb, working_dir: &Path) -> io::Result<ToolOutput>;
}

/// Runs the terraform binary.
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: String,
    /// Capture output instead of letting it stream to the terminal.
    capture_output: bool,
    /// Extra environment for the tool, e.g., the credentials location.
    envs: Vec<(String, String)>,
}

impl Terraform {
    pub fn new(binary: &str) -> Self {
        Terraform {
            binary: binary.to_string(),
            capture_output: false,
            envs: vec![],
        }
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }
}

impl Provisioner for Terraform {
    fn invoke(&self, verb: &Verb, working_dir: &Path) -> io::Result<ToolOutput> {
        let args = verb.args();
        debug!(
            "Running {} {verb} {} in {}",
            self.binary,
            args.join(" "),
            working_dir.display()
        );

        let mut command = Command::new(&self.binary);
        command
            .arg(verb.to_string())
            .args(&args)
            .current_dir(working_dir)
            .envs(self.envs.iter().map(|(k, v)| (k, v)));

        if !self.capture_output {
            let status = command
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()?;
            return Ok(ToolOutput::with_code(exit_code(status)?));
        }

        let output = command.stdin(Stdio::null()).output()?;
        Ok(ToolOutput {
            exit_code: exit_code(output.status)?,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn exit_code(status: std::process::ExitStatus) -> io::Result<i32> {
    status.code().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Interrupted,
            "provisioning tool was terminated by a signal",
        )
    })
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Get the working directory for `plan` under `root`, copying it from the plan templates in
/// `plans_dir` if it does not exist yet.
pub fn prepare_working_dir(plans_dir: &Path, root: &Path, plan: &str) -> crate::Result<PathBuf> {
    let template = plans_dir.join(plan);
    if !template.is_dir() {
        return Err(BurstError::UnknownPlan {
            name: plan.to_string(),
            path: template,
        });
    }

    let dest = root.join(plan);
    if !dest.exists() {
        debug!("Copying plan {} to {}", template.display(), dest.display());
        copy_dir(&template, &dest).map_err(|source| BurstError::Workspace {
            path: dest.clone(),
            source,
        })?;
    }
    Ok(dest)
}

/// Write `contents` to `path`, readable only by the owner. The variables carry the cluster secrets.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    // A file left by an earlier attempt keeps its old mode through open.
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

/// Write the variables into `working_dir`, replacing any written by an earlier attempt.
pub fn write_variables(working_dir: &Path, vars: &VariableSet) -> crate::Result<PathBuf> {
    let path = working_dir.join(VARIABLES_FILE);
    let workspace_err = |source| BurstError::Workspace {
        path: path.clone(),
        source,
    };
    let json = vars
        .to_json()
        .map_err(|e| workspace_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    write_private(&path, json.as_bytes()).map_err(workspace_err)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_arguments() {
        assert_eq!(Verb::Init.args(), vec!["-input=false"]);
        assert_eq!(
            Verb::Plan {
                out: Some(PathBuf::from("/w/tfplan"))
            }
            .args(),
            vec![
                "-input=false",
                "-no-color",
                "-refresh=false",
                "-detailed-exitcode",
                "-out=/w/tfplan"
            ]
        );
        assert_eq!(Verb::Apply.args(), vec!["-input=false", "-auto-approve"]);
        assert_eq!(
            Verb::Destroy { force: true }.args(),
            vec!["-input=false", "-auto-approve"]
        );
        assert_eq!(Verb::Destroy { force: false }.args(), vec!["-input=false"]);
    }

    #[test]
    fn plan_changes_are_not_failures() {
        let plan = Verb::Plan { out: None };
        assert!(plan.succeeded(0));
        assert!(plan.succeeded(2));
        assert!(!plan.succeeded(1));
        assert!(!Verb::Apply.succeeded(2));
    }

    #[cfg(unix)]
    #[test]
    fn variables_are_private() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VARIABLES_FILE);
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let vars = crate::variables::VariableSet {
            project_id: "p".to_string(),
            network_name: "n".to_string(),
            region: "r".to_string(),
            zone: "z".to_string(),
            manager_machine_type: None,
            manager_name_prefix: None,
            manager_scopes: None,
            manager_family: None,
            login_node_specs: vec![],
            login_scopes: None,
            login_family: None,
            compute_node_specs: vec![],
            compute_scopes: vec![],
            compute_family: "f".to_string(),
            broker_config: None,
            curve_cert: None,
            munge_key: Some("a2V5".to_string()),
            resource_hosts: None,
        };
        assert_eq!(write_variables(dir.path(), &vars).unwrap(), path);

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(std::fs::read_to_string(&path).unwrap().contains("a2V5"));
    }

    #[test]
    fn working_dir_is_copied_once() {
        let dir = tempfile::tempdir().unwrap();
        let plans = dir.path().join("plans");
        std::fs::create_dir_all(plans.join("basic/modules")).unwrap();
        std::fs::write(plans.join("basic/main.tf"), "# main").unwrap();
        std::fs::write(plans.join("basic/modules/net.tf"), "# net").unwrap();
        let root = dir.path().join("work");

        let wd = prepare_working_dir(&plans, &root, "basic").unwrap();
        assert_eq!(wd, root.join("basic"));
        assert!(wd.join("modules/net.tf").exists());

        // A second preparation leaves local state (e.g. terraform.tfstate) alone.
        std::fs::write(wd.join("terraform.tfstate"), "{}").unwrap();
        std::fs::write(plans.join("basic/main.tf"), "# changed").unwrap();
        prepare_working_dir(&plans, &root, "basic").unwrap();
        assert_eq!(std::fs::read_to_string(wd.join("main.tf")).unwrap(), "# main");
        assert!(wd.join("terraform.tfstate").exists());

        assert!(matches!(
            prepare_working_dir(&plans, &root, "missing"),
            Err(BurstError::UnknownPlan { .. })
        ));
    }
}
