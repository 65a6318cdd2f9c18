// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::Path;

use log::{debug, info, warn};

use crate::{
    registry::Cluster,
    terraform::{self, Provisioner, Verb, PLAN_FILE},
    variables::VariableSet,
    BurstError,
};

/// The phases a burst cluster goes through, from the first request to its teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unscheduled,
    Validated,
    VariablesCompiled,
    Initialized,
    Planned,
    /// Applied; the cluster exists and is registered.
    Active,
    Destroying,
    Destroyed,
    Failed,
}

impl Phase {
    /// Whether a cluster in this phase may move to `next`.
    pub fn can_enter(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Unscheduled, Validated)
                | (Validated, VariablesCompiled)
                | (VariablesCompiled, Initialized)
                | (Initialized, Planned)
                | (Planned, Active)
                | (Active, Destroying)
                | (Destroying, Destroyed)
                | (Validated, Failed)
                | (Initialized, Failed)
                | (Planned, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Destroyed | Phase::Failed)
    }
}

/// Tracks the phase of one burst attempt, along with every phase it has passed through.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    history: Vec<Phase>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            history: vec![Phase::Unscheduled],
        }
    }

    /// Start tracking from `phase`, e.g., for a cluster that is already active.
    pub fn starting_at(phase: Phase) -> Self {
        Lifecycle {
            history: vec![phase],
        }
    }

    pub fn phase(&self) -> Phase {
        *self.history.last().unwrap_or(&Phase::Unscheduled)
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn enter(&mut self, next: Phase) -> crate::Result<()> {
        let from = self.phase();
        if !from.can_enter(next) {
            return Err(BurstError::Transition { from, to: next });
        }
        debug!("lifecycle {from:?} -> {next:?}");
        self.history.push(next);
        Ok(())
    }

    /// Record that the current phase failed and hand back `err`, so that a failing step reads as
    /// `return Err(lifecycle.fail(err))`.
    pub fn fail(&mut self, err: BurstError) -> BurstError {
        if self.phase().can_enter(Phase::Failed) {
            self.history.push(Phase::Failed);
        }
        err
    }
}

/// Drives the provisioning tool through a burst cluster's lifecycle.
#[derive(Debug)]
pub struct LifecycleDriver<'a> {
    provisioner: &'a dyn Provisioner,
}

/// Where and how to provision a cluster whose variables have been compiled.
#[derive(Debug)]
pub struct ProvisionRequest<'a> {
    pub cluster_name: &'a str,
    pub plan: &'a str,
    pub plans_dir: &'a Path,
    pub working_root: &'a Path,
    pub variables: &'a VariableSet,
}

impl<'a> LifecycleDriver<'a> {
    pub fn new(provisioner: &'a dyn Provisioner) -> Self {
        LifecycleDriver { provisioner }
    }

    fn invoke(&self, verb: &Verb, dir: &Path) -> crate::Result<terraform::ToolOutput> {
        self.provisioner
            .invoke(verb, dir)
            .map_err(|source| BurstError::Spawn {
                verb: verb.to_string(),
                dir: dir.to_path_buf(),
                source,
            })
    }

    /// Bring up the cluster: init, plan, then apply.
    ///
    /// `lifecycle` must be in `VariablesCompiled`. A failure of init or apply is fatal and leaves
    /// the lifecycle `Failed`; a plan that reports changes, or that fails, is not.
    pub fn provision(
        &self,
        lifecycle: &mut Lifecycle,
        request: &ProvisionRequest,
    ) -> crate::Result<Cluster> {
        lifecycle.enter(Phase::Initialized)?;
        let working_dir = terraform::prepare_working_dir(
            request.plans_dir,
            request.working_root,
            request.plan,
        )
        .and_then(|dir| terraform::write_variables(&dir, request.variables).map(|_| dir))
        .map_err(|e| lifecycle.fail(e))?;

        info!("Running terraform init for plan {}...", request.plan);
        let init = self
            .invoke(&Verb::Init, &working_dir)
            .map_err(|e| lifecycle.fail(e))?;
        if !Verb::Init.succeeded(init.exit_code) {
            return Err(lifecycle.fail(BurstError::Tool {
                verb: Verb::Init.to_string(),
                plan: request.plan.to_string(),
                dir: working_dir,
                code: init.exit_code,
            }));
        }

        lifecycle.enter(Phase::Planned)?;
        let plan = Verb::Plan {
            out: Some(working_dir.join(PLAN_FILE)),
        };
        let planned = self
            .invoke(&plan, &working_dir)
            .map_err(|e| lifecycle.fail(e))?;
        if !plan.succeeded(planned.exit_code) {
            warn!(
                "terraform plan for plan {} exited with {}; continuing to apply",
                request.plan, planned.exit_code
            );
        }

        info!("Running terraform apply for plan {}...", request.plan);
        let applied = self
            .invoke(&Verb::Apply, &working_dir)
            .map_err(|e| lifecycle.fail(e))?;
        if !Verb::Apply.succeeded(applied.exit_code) {
            return Err(lifecycle.fail(BurstError::Tool {
                verb: Verb::Apply.to_string(),
                plan: request.plan.to_string(),
                dir: working_dir,
                code: applied.exit_code,
            }));
        }

        lifecycle.enter(Phase::Active)?;
        Ok(Cluster::new(request.cluster_name, request.plan, working_dir))
    }

    /// Destroy `cluster`, forcing approval.
    ///
    /// Returns whether the tool reported success. A failure is only warned about: the cluster may
    /// be partly gone, so the caller drops its record either way and the operator checks the
    /// cloud console.
    pub fn destroy(&self, cluster: &Cluster) -> bool {
        let mut lifecycle = Lifecycle::starting_at(Phase::Active);
        // Cannot fail from Active.
        let _ = lifecycle.enter(Phase::Destroying);

        info!("Cleaning up {}", cluster.name);
        let ok = match self.invoke(&Verb::Destroy { force: true }, &cluster.working_dir) {
            Ok(output) if output.exit_code == 0 => true,
            Ok(output) => {
                warn!(
                    "Error destroying plan {} in {} (exit code {}), check Google Cloud console.",
                    cluster.plan,
                    cluster.working_dir.display(),
                    output.exit_code
                );
                false
            }
            Err(e) => {
                warn!("{e}; check Google Cloud console.");
                false
            }
        };

        let _ = lifecycle.enter(Phase::Destroyed);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        let mut lifecycle = Lifecycle::new();
        for phase in [
            Phase::Validated,
            Phase::VariablesCompiled,
            Phase::Initialized,
            Phase::Planned,
            Phase::Active,
            Phase::Destroying,
            Phase::Destroyed,
        ] {
            lifecycle.enter(phase).unwrap();
        }
        assert!(lifecycle.phase().is_terminal());
        assert_eq!(lifecycle.history().len(), 8);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut lifecycle = Lifecycle::new();
        assert!(matches!(
            lifecycle.enter(Phase::Active),
            Err(BurstError::Transition {
                from: Phase::Unscheduled,
                to: Phase::Active
            })
        ));
        assert_eq!(lifecycle.phase(), Phase::Unscheduled);
    }

    #[test]
    fn failure_only_from_working_phases() {
        assert!(Phase::Validated.can_enter(Phase::Failed));
        assert!(Phase::Initialized.can_enter(Phase::Failed));
        assert!(Phase::Planned.can_enter(Phase::Failed));
        assert!(!Phase::Active.can_enter(Phase::Failed));
        assert!(!Phase::Failed.can_enter(Phase::Validated));

        let mut lifecycle = Lifecycle::starting_at(Phase::Planned);
        let _ = lifecycle.fail(BurstError::InvalidParameters);
        assert_eq!(lifecycle.phase(), Phase::Failed);
    }
}
