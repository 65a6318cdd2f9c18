// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::BurstError;

/// A provisioned burst cluster: the plan it was created from and the working directory holding
/// its variables and provisioning state.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub name: String,
    pub plan: String,
    pub working_dir: PathBuf,
    pub created: NaiveDateTime,
}

impl Cluster {
    pub fn new(name: &str, plan: &str, working_dir: PathBuf) -> Self {
        Cluster {
            name: name.to_string(),
            plan: plan.to_string(),
            working_dir,
            created: Local::now().naive_local(),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: plan={} dir={} created={}",
            self.name,
            self.plan,
            self.working_dir.display(),
            self.created.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// The active burst clusters, keyed by cluster name.
#[derive(Debug, Default, Clone)]
pub struct ClusterRegistry {
    clusters: BTreeMap<String, Cluster>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly applied cluster. Only one cluster may be registered under a name.
    pub fn register(&mut self, cluster: Cluster) -> crate::Result<()> {
        if self.clusters.contains_key(&cluster.name) {
            return Err(BurstError::ClusterExists(cluster.name));
        }
        self.clusters.insert(cluster.name.clone(), cluster);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clusters.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Cluster> {
        self.clusters.remove(name)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    /// The clusters a cleanup request applies to: just `name`, or every cluster when no name is
    /// given. Asking for a name that is not registered is an error.
    pub fn select(&self, name: Option<&str>) -> crate::Result<Vec<Cluster>> {
        match name {
            Some(name) => match self.clusters.get(name) {
                Some(cluster) => Ok(vec![cluster.clone()]),
                None => Err(BurstError::UnknownCluster(name.to_string())),
            },
            None => Ok(self.clusters.values().cloned().collect()),
        }
    }
}
