// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::commands::{Handle, HandledResult};

/// A capacity request derived from a job that did not fit on the local cluster.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub nnodes: u32,
    #[serde(default)]
    pub tasks: u32,
}

impl Job {
    pub fn new(id: &str, nnodes: u32, tasks: u32) -> Self {
        Job {
            id: id.to_string(),
            nnodes,
            tasks,
        }
    }
}

/// The jobs accepted for the next burst, keyed by job id.
#[derive(Debug, Default, Clone)]
pub struct JobAccumulator {
    jobs: BTreeMap<String, Job>,
}

impl JobAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `job`. Returns false if a job with the same id was already recorded, in which case
    /// the accumulator is left as it was.
    pub fn insert(&mut self, job: Job) -> bool {
        if self.jobs.contains_key(&job.id) {
            return false;
        }
        self.jobs.insert(job.id.clone(), job);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// The node count needed to run every accumulated job, one at a time, on a single burst
    /// cluster: the largest request wins.
    pub fn required_nodes(&self) -> Option<u32> {
        self.jobs.values().map(|job| job.nnodes).max()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

/// The on-disk format for a list of jobs handed to the CLI.
#[derive(Deserialize, Debug)]
pub struct JobFile {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl JobFile {
    pub fn from_file(path: &str) -> HandledResult<Self> {
        let contents = std::fs::read_to_string(path).handle_err(|e| {
            log::error!("Could not open jobs file \"{path}\": {e}");
        })?;
        toml::from_str(&contents).handle_err(|e| {
            log::error!("Could not parse jobs file \"{path}\": {e}");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut jobs = JobAccumulator::new();
        assert!(jobs.insert(Job::new("1", 4, 4)));
        assert!(!jobs.insert(Job::new("1", 8, 8)));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.iter().next().unwrap().nnodes, 4);
    }

    #[test]
    fn largest_job_sizes_the_burst() {
        let mut jobs = JobAccumulator::new();
        assert_eq!(jobs.required_nodes(), None);
        jobs.insert(Job::new("a", 2, 2));
        jobs.insert(Job::new("b", 6, 1));
        jobs.insert(Job::new("c", 3, 9));
        assert_eq!(jobs.required_nodes(), Some(6));
    }

    #[test]
    fn job_file() {
        let file: JobFile = toml::from_str(
            r#"
            [[jobs]]
            id = "1"
            nnodes = 4
            tasks = 8

            [[jobs]]
            id = "2"
            nnodes = 2
            "#,
        )
        .unwrap();
        assert_eq!(file.jobs.len(), 2);
        assert_eq!(file.jobs[1].tasks, 0);
    }
}
