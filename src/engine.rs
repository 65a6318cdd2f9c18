// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use log::{debug, info, warn};

use crate::{
    bootstrap,
    config::BurstParameters,
    credentials::CredentialsProvider,
    jobs::{Job, JobAccumulator},
    lifecycle::{Lifecycle, LifecycleDriver, Phase, ProvisionRequest},
    registry::ClusterRegistry,
    state::{Event, Record, StateFile},
    terraform::Provisioner,
    variables, BurstError,
};

/// An explicit request for burst capacity, instead of sizing the burst from the scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstRequest {
    pub nodes: u32,
    pub tasks: Option<u32>,
}

/// What a host scheduler sees of a burst plugin.
pub trait BurstPlugin {
    fn name(&self) -> &str;

    /// Decide whether `job` can be burst, and if so, hold on to it for the next run.
    fn schedule(&mut self, job: Job) -> bool;

    /// Provision a burst cluster for the scheduled jobs, or for `request` when given.
    fn run(&mut self, request: Option<BurstRequest>) -> crate::Result<()>;

    /// Destroy the cluster `name`, or every cluster when no name is given.
    fn cleanup(&mut self, name: Option<&str>) -> crate::Result<()>;
}

/// Bursts to Google Compute Engine by driving terraform plans.
///
/// Only one burst attempt should be in flight per engine. Nothing guards against two engines (or
/// two processes) using the same cluster name and working directory at once.
#[derive(Debug)]
pub struct ComputeEngineBurst {
    name: String,
    params: BurstParameters,
    jobs: JobAccumulator,
    clusters: ClusterRegistry,
    credentials: Box<dyn CredentialsProvider>,
    provisioner: Box<dyn Provisioner>,
    state: Option<StateFile>,
    last_attempt: Option<Lifecycle>,
}

impl ComputeEngineBurst {
    pub const NAME: &'static str = "compute_engine";

    pub fn new(
        params: BurstParameters,
        credentials: Box<dyn CredentialsProvider>,
        provisioner: Box<dyn Provisioner>,
    ) -> Self {
        ComputeEngineBurst {
            name: Self::NAME.to_string(),
            params,
            jobs: JobAccumulator::new(),
            clusters: ClusterRegistry::new(),
            credentials,
            provisioner,
            state: None,
            last_attempt: None,
        }
    }

    /// Record clusters in `state`, starting from the clusters it already knows about.
    pub fn with_state_file(mut self, state: StateFile) -> crate::Result<Self> {
        self.clusters = state.load()?;
        debug!(
            "Loaded {} cluster(s) from {}",
            self.clusters.len(),
            state.path().display()
        );
        self.state = Some(state);
        Ok(self)
    }

    pub fn params(&self) -> &BurstParameters {
        &self.params
    }

    pub fn jobs(&self) -> &JobAccumulator {
        &self.jobs
    }

    pub fn clusters(&self) -> &ClusterRegistry {
        &self.clusters
    }

    /// The lifecycle of the most recent `run` that got past its early exits.
    pub fn last_attempt(&self) -> Option<&Lifecycle> {
        self.last_attempt.as_ref()
    }

    /// Validate the parameters, selecting the plan for the burst mode.
    pub fn validate(&mut self) -> bool {
        self.params.validate()
    }

    fn check_credentials(&self) -> bool {
        if self.credentials.is_available() {
            return true;
        }
        warn!(
            "{} not found in environment, cannot schedule to Compute Engine.",
            self.credentials.binding()
        );
        false
    }

    /// Append `record` to the statefile, if there is one.
    ///
    /// The cloud has already changed by the time a record is written, so a failed write only
    /// costs the record: the in-memory registry stays authoritative for this engine.
    fn record(&mut self, record: &Record) {
        if let Some(state) = &mut self.state {
            if let Err(e) = state.write_record(record) {
                warn!(
                    "Could not record {} of cluster {}: {e}",
                    record.event, record.cluster
                );
            }
        }
    }

    fn attempt(
        &mut self,
        lifecycle: &mut Lifecycle,
        request: Option<BurstRequest>,
    ) -> crate::Result<()> {
        if !self.params.validate() {
            return Err(BurstError::InvalidParameters);
        }
        if !self.check_credentials() {
            return Err(BurstError::MissingCredentials(self.credentials.binding()));
        }
        lifecycle.enter(Phase::Validated)?;

        if self.clusters.contains(&self.params.cluster_name) {
            return Err(lifecycle.fail(BurstError::ClusterExists(
                self.params.cluster_name.clone(),
            )));
        }

        // One burst runs every job, so it only needs to be as large as the largest job.
        let nodes = match request {
            Some(request) => request.nodes,
            None => self.jobs.required_nodes().unwrap_or(0),
        };
        let tasks = match request {
            Some(BurstRequest { tasks: Some(t), .. }) => t,
            _ => self
                .jobs
                .iter()
                .fold(0u32, |total, job| total.saturating_add(job.tasks)),
        };
        info!(
            "Bursting {} with {nodes} node(s) for {tasks} task(s) using plan {}",
            self.params.cluster_name, self.params.terraform_plan_name
        );

        let mut vars =
            variables::compile(&self.params, nodes).map_err(|e| lifecycle.fail(e))?;
        // Nodes joining the local cluster need its secrets and the shared host list.
        if self.params.is_joined() {
            let script =
                bootstrap::render_boot_script(&self.params).map_err(|e| lifecycle.fail(e))?;
            vars.set_compute_boot_script(&script);
        }
        lifecycle.enter(Phase::VariablesCompiled)?;

        let plans_dir = self.params.plans_dir();
        let Some(working_root) = self.params.working_root() else {
            return Err(BurstError::InvalidParameters);
        };
        let driver = LifecycleDriver::new(self.provisioner.as_ref());
        let cluster = driver.provision(
            lifecycle,
            &ProvisionRequest {
                cluster_name: &self.params.cluster_name,
                plan: &self.params.terraform_plan_name,
                plans_dir: &plans_dir,
                working_root,
                variables: &vars,
            },
        )?;

        info!("Cluster {} is up", cluster);
        let record = Record::new(Event::Apply, &cluster);
        self.clusters.register(cluster)?;
        self.record(&record);

        // TODO: an isolated burst cluster has no lead broker to hand it jobs; submit the
        // accumulated jobs to it directly once its flux instance is reachable.
        if request.is_none() {
            self.jobs.clear();
        }
        Ok(())
    }
}

impl BurstPlugin for ComputeEngineBurst {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&mut self, job: Job) -> bool {
        if !self.params.validate() {
            return false;
        }
        if !self.check_credentials() {
            return false;
        }

        // Every job is accepted for now. Matching the job against the instance shapes this
        // plugin can provide belongs here.
        let id = job.id.clone();
        if !self.jobs.insert(job) {
            debug!("{id} is already scheduled");
        }
        true
    }

    fn run(&mut self, request: Option<BurstRequest>) -> crate::Result<()> {
        if self.jobs.is_empty() && request.is_none() {
            info!("Plugin {} has no jobs to burst.", self.name);
            return Ok(());
        }
        if matches!(request, Some(BurstRequest { nodes: 0, .. })) {
            warn!("Burst requests require nodes and tasks.");
            return Ok(());
        }

        let mut lifecycle = Lifecycle::new();
        let result = self.attempt(&mut lifecycle, request);
        self.last_attempt = Some(lifecycle);
        result
    }

    fn cleanup(&mut self, name: Option<&str>) -> crate::Result<()> {
        let targets = self.clusters.select(name)?;

        for cluster in targets {
            // Once destroy has been attempted the local record no longer describes what exists
            // in the cloud, so it is dropped whether or not the destroy succeeded.
            LifecycleDriver::new(self.provisioner.as_ref()).destroy(&cluster);
            self.clusters.remove(&cluster.name);
            self.record(&Record::new(Event::Destroy, &cluster));
        }
        Ok(())
    }
}
