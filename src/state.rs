// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDateTime};

use crate::{
    registry::{Cluster, ClusterRegistry},
    BurstError,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%f";

/// A file recording every cluster applied and destroyed, so that a later process can find the
/// clusters an earlier one created.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    file: File,
}

impl StateFile {
    pub fn open(path: &Path) -> crate::Result<Self> {
        let state_err = |e: std::io::Error| BurstError::State {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(state_err)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(state_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Open an existing statefile only to read it. Writing a record to it fails.
    pub fn open_read_only(path: &Path) -> crate::Result<Self> {
        let file = File::open(path).map_err(|e| BurstError::State {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebuild the registry by replaying every record in the file.
    pub fn load(&self) -> crate::Result<ClusterRegistry> {
        let mut registry = ClusterRegistry::new();
        for record in self.records()? {
            match record.event {
                Event::Apply => {
                    registry.remove(&record.cluster);
                    registry.register(Cluster {
                        name: record.cluster,
                        plan: record.plan,
                        working_dir: record.working_dir,
                        created: record.timestamp,
                    })?;
                }
                Event::Destroy => {
                    registry.remove(&record.cluster);
                }
            }
        }
        Ok(registry)
    }

    /// All records in the file, sorted by timestamp in ascending order.
    pub fn records(&self) -> crate::Result<Vec<Record>> {
        let file = File::open(&self.path)
            .map_err(|e| self.error(format!("could not open for reading: {e}")))?;
        let lines = BufReader::new(file).lines();
        let mut records = lines
            .map(|line| {
                let line = line.map_err(|e| self.error(format!("unable to read line: {e}")))?;
                Record::from_string(&line).map_err(|e| self.error(e))
            })
            .collect::<crate::Result<Vec<Record>>>()?;
        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }

    /// Writes a single record to the statefile.
    pub fn write_record(&mut self, record: &Record) -> crate::Result<()> {
        let line = format!("{}\n", record.as_string());
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| self.error(format!("failed to write record: {e}")))
    }

    fn error(&self, message: String) -> BurstError {
        BurstError::State {
            path: self.path.clone(),
            message,
        }
    }
}

/// A single cluster event tracked in the statefile.
#[derive(Debug, PartialEq)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub event: Event,
    pub cluster: String,
    pub plan: String,
    pub working_dir: PathBuf,
}

impl Record {
    pub fn new(event: Event, cluster: &Cluster) -> Self {
        Record {
            timestamp: match event {
                Event::Apply => cluster.created,
                Event::Destroy => Local::now().naive_local(),
            },
            event,
            cluster: cluster.name.clone(),
            plan: cluster.plan.clone(),
            working_dir: cluster.working_dir.clone(),
        }
    }

    pub fn as_string(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.event,
            self.cluster,
            self.plan,
            self.working_dir.display(),
        )
    }

    pub fn from_string(record: &str) -> Result<Self, String> {
        let mut fields = record.split('\t');
        let mut next = |name: &str| {
            fields
                .next()
                .ok_or_else(|| format!("missing {name} field in '{record}'"))
        };
        let timestamp = next("timestamp")?;
        let event = next("event")?;
        let cluster = next("cluster")?;
        let plan = next("plan")?;
        let working_dir = next("working_dir")?;

        let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| format!("failed to parse timestamp: '{e}'"))?;

        Ok(Self {
            timestamp,
            event: Event::try_from(event)?,
            cluster: cluster.to_string(),
            plan: plan.to_string(),
            working_dir: PathBuf::from(working_dir),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Cluster was applied and registered.
    Apply,
    /// Cluster destroy was attempted and its record dropped.
    Destroy,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Self::Apply => "apply",
                Self::Destroy => "destroy",
            }
        )
    }
}

impl TryFrom<&str> for Event {
    type Error = String;
    fn try_from(val: &str) -> Result<Self, Self::Error> {
        match val {
            "apply" => Ok(Self::Apply),
            "destroy" => Ok(Self::Destroy),
            _ => Err(format!("failed to parse '{val}' as Event")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_line() {
        let cluster = Cluster::new("c", "basic", PathBuf::from("/tmp/burst-x/basic"));
        let record = Record::new(Event::Apply, &cluster);
        let parsed = Record::from_string(&record.as_string()).unwrap();
        assert_eq!(parsed, record);

        assert!(Record::from_string("2025-01-01T00:00:00.0\tapply\tc").is_err());
        assert!(Record::from_string("2025-01-01T00:00:00.0\tmanage\tc\tbasic\t/w").is_err());
    }

    #[test]
    fn replay_rebuilds_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/burst.state");

        let a = Cluster::new("a", "basic", dir.path().join("a"));
        let b = Cluster::new("b", "burst", dir.path().join("b"));
        {
            let mut state = StateFile::open(&path).unwrap();
            state.write_record(&Record::new(Event::Apply, &a)).unwrap();
            state.write_record(&Record::new(Event::Apply, &b)).unwrap();
            state.write_record(&Record::new(Event::Destroy, &a)).unwrap();
        }

        let state = StateFile::open(&path).unwrap();
        let registry = state.load().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("b").unwrap().plan, "burst");
        assert_eq!(registry.get("b").unwrap().working_dir, dir.path().join("b"));
    }

    #[test]
    fn read_only_statefile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burst.state");
        assert!(StateFile::open_read_only(&path).is_err());

        let a = Cluster::new("a", "basic", dir.path().join("a"));
        StateFile::open(&path)
            .unwrap()
            .write_record(&Record::new(Event::Apply, &a))
            .unwrap();

        let mut state = StateFile::open_read_only(&path).unwrap();
        assert_eq!(state.load().unwrap().len(), 1);
        assert!(matches!(
            state.write_record(&Record::new(Event::Destroy, &a)),
            Err(BurstError::State { .. })
        ));
        assert_eq!(state.records().unwrap().len(), 1);
    }
}
