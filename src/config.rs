// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::commands::{Handle, HandledResult};

/// Plan used for an isolated burst, which brings up an independent cluster.
pub const ISOLATED_PLAN: &str = "basic";

/// Plan used when the burst cluster joins the overlay network of the local cluster.
pub const JOINED_PLAN: &str = "burst";

/// BurstParameters is the model for a burst cluster used in the burst configuration file. The
/// config file is deserialized into a BurstParameters object, and every field other than `project`
/// has a default so that a minimal file is just the project name.
///
/// The parameters are only changed by `validate()`, which fills in a working directory when none
/// was given, and by `check()`, which selects the plan that matches the burst mode.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BurstParameters {
    /// Google Cloud project.
    pub project: String,

    #[serde(default = "default_network_name")]
    pub network_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_zone")]
    pub zone: String,

    /// An isolated burst brings up an independent cluster that does not join the local overlay.
    #[serde(default)]
    pub isolated_burst: bool,

    /// Lead broker service hostname or ip address.
    pub lead_host: Option<String>,

    /// Lead broker service port (e.g, 30093).
    pub lead_port: Option<u16>,

    /// Host names of the burst cluster, in broker rank order after the lead host, e.g.,
    /// `gffw-login-001,gffw-compute-a-[001-004]`.
    pub lead_hostnames: Option<String>,

    /// Number of hosts following the lead host. Used to derive the host names from the login and
    /// compute name prefixes when `lead_hostnames` is not given.
    pub lead_size: Option<u32>,

    /// Directory in which plan working directories are created. If not set, a temporary
    /// directory is created during validation.
    pub terraform_dir: Option<PathBuf>,

    /// Directory holding the plan templates, one subdirectory per plan.
    pub plans_dir: Option<PathBuf>,

    pub terraform_binary: Option<String>,

    pub broker_config: Option<PathBuf>,
    pub curve_cert: Option<PathBuf>,
    pub munge_key: Option<PathBuf>,

    #[serde(default = "default_plan_name")]
    pub terraform_plan_name: String,
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    #[serde(default = "default_manager_machine_type")]
    pub manager_machine_type: String,
    #[serde(default = "default_scopes")]
    pub manager_scopes: Vec<String>,
    #[serde(default = "default_manager_name_prefix")]
    pub manager_name_prefix: String,
    #[serde(default = "default_manager_family")]
    pub manager_family: String,

    #[serde(default = "default_scopes")]
    pub login_scopes: Vec<String>,
    #[serde(default = "default_login_name_prefix")]
    pub login_name_prefix: String,
    #[serde(default = "default_login_family")]
    pub login_family: String,
    #[serde(default = "default_machine_arch")]
    pub login_machine_arch: String,
    #[serde(default = "default_login_machine_type")]
    pub login_machine_type: String,
    #[serde(default = "default_login_count")]
    pub login_count: u32,
    pub login_boot_script: Option<PathBuf>,

    #[serde(default = "default_scopes")]
    pub compute_scopes: Vec<String>,
    #[serde(default = "default_compute_name_prefix")]
    pub compute_name_prefix: String,
    #[serde(default = "default_machine_arch")]
    pub compute_machine_arch: String,
    #[serde(default = "default_compute_machine_type")]
    pub compute_machine_type: String,
    pub compute_boot_script: Option<PathBuf>,
    #[serde(default = "default_compute_family")]
    pub compute_family: String,
    #[serde(default)]
    pub compute_compact: bool,

    pub gpu_type: Option<String>,
    #[serde(default)]
    pub gpu_count: u32,

    // Accepted so that existing configuration files load, but not acted on yet.
    pub log_level: Option<u8>,
    pub flux_user: Option<String>,
    pub wrap: Option<String>,
}

fn default_network_name() -> String {
    "foundation-net".to_string()
}

fn default_region() -> String {
    "us-central1".to_string()
}

fn default_zone() -> String {
    "us-central1-a".to_string()
}

fn default_plan_name() -> String {
    ISOLATED_PLAN.to_string()
}

fn default_cluster_name() -> String {
    "flux-bursted-cluster".to_string()
}

fn default_manager_machine_type() -> String {
    "e2-standard-8".to_string()
}

/// API scopes for every role default to all of Google Cloud.
fn default_scopes() -> Vec<String> {
    vec!["cloud-platform".to_string()]
}

fn default_manager_name_prefix() -> String {
    "gffw".to_string()
}

fn default_manager_family() -> String {
    "flux-fw-manager-x86-64".to_string()
}

fn default_login_name_prefix() -> String {
    "gffw-login".to_string()
}

fn default_login_family() -> String {
    "flux-fw-login-x86-64".to_string()
}

fn default_machine_arch() -> String {
    "x86-64".to_string()
}

fn default_login_machine_type() -> String {
    "e2-standard-4".to_string()
}

fn default_login_count() -> u32 {
    1
}

fn default_compute_name_prefix() -> String {
    "gffw-compute-a".to_string()
}

fn default_compute_machine_type() -> String {
    "c2-standard-8".to_string()
}

fn default_compute_family() -> String {
    "flux-fw-compute-x86-64".to_string()
}

impl BurstParameters {
    /// Parameters for `project` with every other field at its default.
    pub fn new(project: &str) -> Self {
        BurstParameters {
            project: project.to_string(),
            network_name: default_network_name(),
            region: default_region(),
            zone: default_zone(),
            isolated_burst: false,
            lead_host: None,
            lead_port: None,
            lead_hostnames: None,
            lead_size: None,
            terraform_dir: None,
            plans_dir: None,
            terraform_binary: None,
            broker_config: None,
            curve_cert: None,
            munge_key: None,
            terraform_plan_name: default_plan_name(),
            cluster_name: default_cluster_name(),
            manager_machine_type: default_manager_machine_type(),
            manager_scopes: default_scopes(),
            manager_name_prefix: default_manager_name_prefix(),
            manager_family: default_manager_family(),
            login_scopes: default_scopes(),
            login_name_prefix: default_login_name_prefix(),
            login_family: default_login_family(),
            login_machine_arch: default_machine_arch(),
            login_machine_type: default_login_machine_type(),
            login_count: default_login_count(),
            login_boot_script: None,
            compute_scopes: default_scopes(),
            compute_name_prefix: default_compute_name_prefix(),
            compute_machine_arch: default_machine_arch(),
            compute_machine_type: default_compute_machine_type(),
            compute_boot_script: None,
            compute_family: default_compute_family(),
            compute_compact: false,
            gpu_type: None,
            gpu_count: 0,
            log_level: None,
            flux_user: None,
            wrap: None,
        }
    }

    /// Read parameters from the TOML file at `path`.
    pub fn from_file(path: &str) -> HandledResult<Self> {
        let contents = std::fs::read_to_string(path).handle_err(|e| {
            error!("Could not open config file \"{path}\": {e}");
        })?;
        toml::from_str(&contents).handle_err(|e| {
            error!("Could not parse config file \"{path}\": {e}");
        })
    }

    /// Whether this burst joins the overlay network of the local cluster.
    pub fn is_joined(&self) -> bool {
        !self.isolated_burst
    }

    pub fn plans_dir(&self) -> PathBuf {
        match &self.plans_dir {
            Some(dir) => dir.clone(),
            None => PathBuf::from(crate::default_plans_dir()),
        }
    }

    /// The template directory of the currently selected plan.
    pub fn plan_template_dir(&self) -> PathBuf {
        self.plans_dir().join(&self.terraform_plan_name)
    }

    pub fn terraform_binary(&self) -> String {
        match &self.terraform_binary {
            Some(bin) => bin.clone(),
            None => crate::default_terraform_binary(),
        }
    }

    /// Validate the parameters before provisioning, reporting each problem found.
    ///
    /// Creates and keeps a temporary working directory when none was configured, then runs
    /// [`check`](Self::check).
    pub fn validate(&mut self) -> bool {
        // This is the base directory, with subfolders as named plans
        if self.terraform_dir.is_none() {
            match tempfile::Builder::new().prefix("burst-").tempdir() {
                Ok(dir) => {
                    let path = dir.keep();
                    debug!("Using temporary terraform directory {}", path.display());
                    self.terraform_dir = Some(path);
                }
                Err(e) => {
                    error!("Could not create a temporary terraform directory: {e}");
                    return false;
                }
            }
        }
        self.check()
    }

    /// Check the parameters without touching the filesystem beyond looking at the given paths.
    ///
    /// A non-isolated burst needs everything required to join the local cluster: the lead broker
    /// host and port, the burst host names (or their count), the curve certificate, and the munge
    /// key. Any path that is given must exist on disk.
    ///
    /// On success the plan name is set from the burst mode alone, overriding any configured plan.
    /// Returns false, without changing the plan, when anything is missing; callers must not
    /// provision in that case.
    pub fn check(&mut self) -> bool {
        let secrets = [
            ("Munge key", &self.munge_key),
            ("Curve certificate", &self.curve_cert),
            ("Broker config", &self.broker_config),
        ];
        for (what, path) in secrets {
            if let Some(path) = path {
                if !path.exists() {
                    error!("{what} {} does not exist.", path.display());
                    return false;
                }
            }
        }

        if self.is_joined()
            && (self.lead_host.is_none()
                || self.lead_port.is_none()
                || (self.lead_hostnames.is_none() && self.lead_size.is_none())
                || self.curve_cert.is_none()
                || self.munge_key.is_none())
        {
            error!(
                "A non-isolated burst should have lead host, port, hostnames, curve cert, and munge key defined."
            );
            return false;
        }

        for script in [&self.login_boot_script, &self.compute_boot_script]
            .into_iter()
            .flatten()
        {
            if !script.exists() {
                error!("Boot script {} does not exist.", script.display());
                return false;
            }
        }

        let plan = if self.is_joined() {
            JOINED_PLAN
        } else {
            ISOLATED_PLAN
        };
        if self.terraform_plan_name != plan {
            debug!(
                "Using plan {plan} instead of configured plan {}",
                self.terraform_plan_name
            );
            self.terraform_plan_name = plan.to_string();
        }
        true
    }

    pub fn working_root(&self) -> Option<&Path> {
        self.terraform_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "secret").unwrap();
        path
    }

    fn joined(dir: &Path) -> BurstParameters {
        let mut params = BurstParameters::new("p");
        params.terraform_dir = Some(dir.to_path_buf());
        params.lead_host = Some("10.0.0.1".to_string());
        params.lead_port = Some(30093);
        params.lead_hostnames = Some("gffw-login-001,gffw-compute-a-[001-003]".to_string());
        params.curve_cert = Some(touch(dir, "curve.cert"));
        params.munge_key = Some(touch(dir, "munge.key"));
        params
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let params: BurstParameters = toml::from_str("project = \"p\"").unwrap();
        assert_eq!(params.terraform_plan_name, ISOLATED_PLAN);
        assert_eq!(params.cluster_name, "flux-bursted-cluster");
        assert_eq!(params.login_count, 1);
        assert_eq!(params.compute_scopes, vec!["cloud-platform"]);
        assert!(!params.isolated_burst);
    }

    #[test]
    fn joined_burst_selects_joined_plan() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = joined(dir.path());
        assert!(params.validate());
        assert_eq!(params.terraform_plan_name, JOINED_PLAN);
    }

    #[test]
    fn isolated_burst_keeps_isolated_plan() {
        let mut params = BurstParameters::new("p");
        params.isolated_burst = true;
        assert!(params.validate());
        assert_eq!(params.terraform_plan_name, ISOLATED_PLAN);
        assert!(params.terraform_dir.as_ref().unwrap().is_dir());
    }

    #[test]
    fn joined_burst_requires_every_join_field() {
        let dir = tempfile::tempdir().unwrap();
        let clears: [fn(&mut BurstParameters); 5] = [
            |p| p.lead_host = None,
            |p| p.lead_port = None,
            |p| p.lead_hostnames = None,
            |p| p.curve_cert = None,
            |p| p.munge_key = None,
        ];
        for clear in clears {
            let mut params = joined(dir.path());
            clear(&mut params);
            assert!(!params.validate());
            assert_eq!(params.terraform_plan_name, ISOLATED_PLAN);
        }
    }

    #[test]
    fn burst_mode_decides_the_plan() {
        let mut params = BurstParameters::new("p");
        params.isolated_burst = true;
        params.terraform_plan_name = JOINED_PLAN.to_string();
        assert!(params.validate());
        assert_eq!(params.terraform_plan_name, ISOLATED_PLAN);

        let dir = tempfile::tempdir().unwrap();
        let mut params = joined(dir.path());
        params.terraform_plan_name = "gpu".to_string();
        assert!(params.validate());
        assert_eq!(params.terraform_plan_name, JOINED_PLAN);
    }

    #[test]
    fn check_does_not_create_working_dir() {
        let mut params = BurstParameters::new("p");
        params.isolated_burst = true;
        assert!(params.check());
        assert!(params.working_root().is_none());
    }

    #[test]
    fn lead_size_stands_in_for_hostnames() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = joined(dir.path());
        params.lead_hostnames = None;
        params.lead_size = Some(4);
        assert!(params.validate());
    }

    #[test]
    fn missing_paths_fail() {
        let dir = tempfile::tempdir().unwrap();

        let mut params = joined(dir.path());
        params.munge_key = Some(dir.path().join("nope.key"));
        assert!(!params.validate());

        let mut params = joined(dir.path());
        params.curve_cert = Some(dir.path().join("nope.cert"));
        assert!(!params.validate());
        assert_eq!(params.terraform_plan_name, ISOLATED_PLAN);

        let mut params = BurstParameters::new("p");
        params.isolated_burst = true;
        params.compute_boot_script = Some(dir.path().join("missing.sh"));
        assert!(!params.validate());

        let mut params = BurstParameters::new("p");
        params.isolated_burst = true;
        params.broker_config = Some(dir.path().join("broker.toml"));
        assert!(!params.validate());
    }
}
