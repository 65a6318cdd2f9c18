// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::{
    bootstrap,
    config::BurstParameters,
    BurstError,
};

/// Name of the boot script a plan may ship as the default for its login and compute nodes.
const DEFAULT_BOOT_SCRIPT: &str = "boot_script.sh";

const REDACTED: &str = "<redacted>";

/// The shape of one group of instances of the same role.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name_prefix: String,
    pub machine_arch: String,
    pub machine_type: String,
    pub instances: u32,
    pub properties: Vec<String>,
    /// Contents of the script run when the instance first boots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact: Option<bool>,
}

/// The variables handed to a provisioning plan. Fields left as `None` (or empty lists) are not
/// written out, so the plan's own defaults apply.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VariableSet {
    pub project_id: String,
    pub network_name: String,
    pub region: String,
    pub zone: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_name_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_family: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub login_node_specs: Vec<NodeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_family: Option<String>,

    pub compute_node_specs: Vec<NodeSpec>,
    pub compute_scopes: Vec<String>,
    pub compute_family: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve_cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub munge_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_hosts: Option<String>,
}

impl VariableSet {
    /// Use `script` as the boot script for every compute node group.
    pub fn set_compute_boot_script(&mut self, script: &str) {
        for spec in self.compute_node_specs.iter_mut() {
            spec.boot_script = Some(script.to_string());
        }
    }

    pub fn compute_instances(&self) -> u32 {
        self.compute_node_specs.iter().map(|s| s.instances).sum()
    }

    /// A copy with the secrets (and the boot scripts, which embed them) replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut vars = self.clone();
        let hide = |field: &mut Option<String>| {
            if field.is_some() {
                *field = Some(REDACTED.to_string());
            }
        };
        hide(&mut vars.curve_cert);
        hide(&mut vars.munge_key);
        for spec in vars
            .login_node_specs
            .iter_mut()
            .chain(vars.compute_node_specs.iter_mut())
        {
            hide(&mut spec.boot_script);
        }
        vars
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn read_script(what: &'static str, path: &Path) -> crate::Result<String> {
    std::fs::read_to_string(path).map_err(|source| BurstError::Read {
        what,
        path: path.to_path_buf(),
        source,
    })
}

/// Pick the explicit boot script if one was given, else the plan's default if it ships one.
fn resolve_boot_script(explicit: &Option<PathBuf>, default: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.clone()),
        None if default.exists() => {
            debug!("Using default boot script {}", default.display());
            Some(default.to_path_buf())
        }
        None => None,
    }
}

/// Number of compute instances to request so that the burst cluster has `required_nodes` nodes
/// able to run jobs. A joined burst counts the login nodes among them.
pub fn compute_instances(params: &BurstParameters, required_nodes: u32) -> u32 {
    if params.isolated_burst {
        required_nodes
    } else {
        required_nodes.saturating_sub(params.login_count)
    }
}

/// Build the variable set for the plan selected in `params`, sized for `required_nodes` nodes.
///
/// Reads the boot scripts, the curve certificate, the munge key, and the broker config from disk;
/// nothing else is touched. The plan's template directory must exist.
pub fn compile(params: &BurstParameters, required_nodes: u32) -> crate::Result<VariableSet> {
    let plan_dir = params.plan_template_dir();
    if !plan_dir.is_dir() {
        return Err(BurstError::UnknownPlan {
            name: params.terraform_plan_name.clone(),
            path: plan_dir,
        });
    }

    let default_script = plan_dir.join(DEFAULT_BOOT_SCRIPT);
    let login_script = resolve_boot_script(&params.login_boot_script, &default_script)
        .map(|path| read_script("login boot script", &path))
        .transpose()?;
    let compute_script = resolve_boot_script(&params.compute_boot_script, &default_script)
        .map(|path| read_script("compute boot script", &path))
        .transpose()?;

    let compute = NodeSpec {
        name_prefix: params.compute_name_prefix.clone(),
        machine_arch: params.compute_machine_arch.clone(),
        machine_type: params.compute_machine_type.clone(),
        instances: compute_instances(params, required_nodes),
        properties: vec![],
        boot_script: compute_script,
        gpu_type: params.gpu_type.clone(),
        gpu_count: Some(params.gpu_count),
        compact: Some(params.compute_compact),
    };

    let mut vars = VariableSet {
        project_id: params.project.clone(),
        network_name: params.network_name.clone(),
        region: params.region.clone(),
        zone: params.zone.clone(),
        manager_machine_type: None,
        manager_name_prefix: None,
        manager_scopes: None,
        manager_family: None,
        login_node_specs: vec![],
        login_scopes: None,
        login_family: None,
        compute_node_specs: vec![compute],
        compute_scopes: params.compute_scopes.clone(),
        compute_family: params.compute_family.clone(),
        broker_config: None,
        curve_cert: None,
        munge_key: None,
        resource_hosts: None,
    };

    // A joined burst only brings up compute nodes; the manager and login roles are served by
    // the local cluster.
    if params.isolated_burst {
        vars.manager_machine_type = Some(params.manager_machine_type.clone());
        vars.manager_name_prefix = Some(params.manager_name_prefix.clone());
        vars.manager_scopes = Some(params.manager_scopes.clone());
        vars.manager_family = Some(params.manager_family.clone());
        vars.login_node_specs.push(NodeSpec {
            name_prefix: params.login_name_prefix.clone(),
            machine_arch: params.login_machine_arch.clone(),
            machine_type: params.login_machine_type.clone(),
            instances: params.login_count,
            properties: vec![],
            boot_script: login_script,
            gpu_type: None,
            gpu_count: None,
            compact: None,
        });
        vars.login_scopes = Some(params.login_scopes.clone());
        vars.login_family = Some(params.login_family.clone());
    }

    if let Some(path) = &params.broker_config {
        vars.broker_config = Some(read_script("broker config", path)?);
    }
    if let Some(path) = &params.curve_cert {
        vars.curve_cert = Some(bootstrap::read_curve_cert(path)?);
    }
    if let Some(path) = &params.munge_key {
        vars.munge_key = Some(bootstrap::read_munge_key(path)?);
    }
    if params.is_joined() {
        vars.resource_hosts = bootstrap::resource_hostlist(params);
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ISOLATED_PLAN, JOINED_PLAN};

    fn plans(dir: &Path) -> PathBuf {
        let plans = dir.join("plans");
        std::fs::create_dir_all(plans.join(ISOLATED_PLAN)).unwrap();
        std::fs::create_dir_all(plans.join(JOINED_PLAN)).unwrap();
        std::fs::write(plans.join(ISOLATED_PLAN).join(DEFAULT_BOOT_SCRIPT), "#!/bin/sh\n").unwrap();
        plans
    }

    fn isolated(dir: &Path) -> BurstParameters {
        let mut params = BurstParameters::new("p");
        params.isolated_burst = true;
        params.plans_dir = Some(plans(dir));
        params
    }

    fn joined(dir: &Path) -> BurstParameters {
        let mut params = BurstParameters::new("p");
        params.plans_dir = Some(plans(dir));
        params.terraform_plan_name = JOINED_PLAN.to_string();
        params.lead_host = Some("10.0.0.1".to_string());
        params.lead_port = Some(30093);
        params.lead_hostnames = Some("gffw-compute-a-[001-003]".to_string());
        let cert = dir.join("curve.cert");
        std::fs::write(&cert, "curve cert").unwrap();
        let key = dir.join("munge.key");
        std::fs::write(&key, b"munge").unwrap();
        params.curve_cert = Some(cert);
        params.munge_key = Some(key);
        params
    }

    #[test]
    fn joined_plan_subtracts_login_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let params = joined(dir.path());
        let vars = compile(&params, 4).unwrap();

        assert_eq!(vars.compute_node_specs[0].instances, 3);
        assert!(vars.login_node_specs.is_empty());
        assert_eq!(vars.manager_machine_type, None);
        assert_eq!(vars.curve_cert.as_deref(), Some("curve cert"));
        assert_eq!(vars.munge_key.as_deref(), Some("bXVuZ2U="));
        assert_eq!(
            vars.resource_hosts.as_deref(),
            Some("10.0.0.1,gffw-compute-a-[001-003]")
        );
    }

    #[test]
    fn isolated_plan_uses_whole_count() {
        let dir = tempfile::tempdir().unwrap();
        let params = isolated(dir.path());
        let vars = compile(&params, 4).unwrap();

        assert_eq!(vars.compute_instances(), 4);
        assert_eq!(vars.login_node_specs.len(), 1);
        assert_eq!(vars.login_node_specs[0].instances, 1);
        assert_eq!(
            vars.login_node_specs[0].boot_script.as_deref(),
            Some("#!/bin/sh\n")
        );
        assert_eq!(vars.manager_family.as_deref(), Some("flux-fw-manager-x86-64"));
        assert_eq!(vars.resource_hosts, None);
        assert_eq!(vars.curve_cert, None);
    }

    #[test]
    fn isolated_burst_ignores_configured_plan() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = isolated(dir.path());
        params.terraform_plan_name = JOINED_PLAN.to_string();
        params.terraform_dir = Some(dir.path().join("work"));
        assert!(params.validate());

        let vars = compile(&params, 4).unwrap();
        assert_eq!(vars.compute_instances(), 4);
        assert_eq!(vars.login_node_specs.len(), 1);
        assert!(vars.manager_machine_type.is_some());
    }

    #[test]
    fn explicit_boot_script_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = isolated(dir.path());
        let script = dir.path().join("compute.sh");
        std::fs::write(&script, "echo compute").unwrap();
        params.compute_boot_script = Some(script);

        let vars = compile(&params, 2).unwrap();
        assert_eq!(
            vars.compute_node_specs[0].boot_script.as_deref(),
            Some("echo compute")
        );
        assert_eq!(
            vars.login_node_specs[0].boot_script.as_deref(),
            Some("#!/bin/sh\n")
        );
    }

    #[test]
    fn unknown_plan_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = isolated(dir.path());
        params.terraform_plan_name = "gpu".to_string();
        assert!(matches!(
            compile(&params, 2),
            Err(BurstError::UnknownPlan { name, .. }) if name == "gpu"
        ));
    }

    #[test]
    fn unreadable_secret_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = joined(dir.path());
        params.curve_cert = Some(dir.path().join("gone.cert"));
        assert!(matches!(
            compile(&params, 2),
            Err(BurstError::Read { what: "curve certificate", .. })
        ));
    }

    #[test]
    fn serialized_variables_skip_absent_fields() {
        let dir = tempfile::tempdir().unwrap();
        let vars = compile(&joined(dir.path()), 3).unwrap();
        let json: serde_json::Value = serde_json::from_str(&vars.to_json().unwrap()).unwrap();

        assert_eq!(json["project_id"], "p");
        assert_eq!(json["compute_node_specs"][0]["instances"], 2);
        assert!(json.get("login_node_specs").is_none());
        assert!(json.get("broker_config").is_none());

        let shown = vars.redacted();
        assert_eq!(shown.munge_key.as_deref(), Some(REDACTED));
        assert_eq!(shown.compute_instances(), 2);
    }
}
