//! Build history lookup and the in-memory snapshot implementation

use crate::build::{Build, BuildRef, JobId};
use crate::job::Job;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Read access to the host's build history.
///
/// Implementations must already hold every job the engine will ask for; lookups
/// never block.
pub trait BuildHistory: Send + Sync {
    fn job(&self, id: &JobId) -> Option<&Job>;

    fn build(&self, build: &BuildRef) -> Option<&Build> {
        self.job(&build.job)?.build(build.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("job '{0}' is defined more than once")]
    DuplicateJob(JobId),

    #[error("build #{number} of job '{job}' is defined more than once")]
    DuplicateBuild { job: JobId, number: u32 },
}

// ============================================================================
// SNAPSHOT FORMAT
// ============================================================================

/// Serializable form of a whole history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    #[serde(default)]
    pub jobs: Vec<JobSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub name: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<JobId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permalinks: BTreeMap<String, u32>,
    #[serde(default)]
    pub builds: Vec<Build>,
}

// ============================================================================
// IN-MEMORY HISTORY
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    jobs: HashMap<JobId, Job>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, job: Job) -> Self {
        self.insert(job);
        self
    }

    pub fn insert(&mut self, job: Job) -> Option<Job> {
        self.jobs.insert(job.id.clone(), job)
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &JobId> {
        self.jobs.keys()
    }

    pub fn from_snapshot(snapshot: HistorySnapshot) -> Result<Self, HistoryError> {
        let mut history = Self::new();
        for entry in snapshot.jobs {
            if history.jobs.contains_key(&entry.name) {
                return Err(HistoryError::DuplicateJob(entry.name));
            }
            let mut job = Job::new(entry.name.clone());
            job.root = entry.root;
            for (name, number) in entry.permalinks {
                job = job.with_permalink(name, number);
            }
            for build in entry.builds {
                let number = build.number;
                if job.insert_build(build).is_some() {
                    return Err(HistoryError::DuplicateBuild {
                        job: entry.name,
                        number,
                    });
                }
            }
            history.insert(job);
        }
        Ok(history)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let snapshot: HistorySnapshot =
            serde_yaml::from_str(content).context("Failed to parse history YAML")?;
        Ok(Self::from_snapshot(snapshot)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let snapshot: HistorySnapshot =
            serde_json::from_str(content).context("Failed to parse history JSON")?;
        Ok(Self::from_snapshot(snapshot)?)
    }

    /// Loads a snapshot file; `.json` is read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read history file: {:?}", path))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let history = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };
        history.with_context(|| format!("Invalid history file: {:?}", path))
    }
}

impl BuildHistory for InMemoryHistory {
    fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }
}
