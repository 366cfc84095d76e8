//! Build records and their identities

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// IDENTITIES
// ============================================================================

/// Full name of a job in the host scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for JobId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identity of a single build: job plus build number.
///
/// Two builds are the same candidate iff their refs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildRef {
    pub job: JobId,
    pub number: u32,
}

impl BuildRef {
    pub fn new(job: impl Into<JobId>, number: u32) -> Self {
        Self {
            job: job.into(),
            number,
        }
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildRefParseError {
    #[error("expected <job>#<number>, got '{0}'")]
    MissingSeparator(String),

    #[error("invalid build number '{0}'")]
    InvalidNumber(String),

    #[error("job name is empty")]
    EmptyJob,
}

/// Parses `job#number`. The last `#` separates, so job names may contain `#`.
impl FromStr for BuildRef {
    type Err = BuildRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (job, number) = s
            .rsplit_once('#')
            .ok_or_else(|| BuildRefParseError::MissingSeparator(s.to_string()))?;
        let job = job.trim();
        if job.is_empty() {
            return Err(BuildRefParseError::EmptyJob);
        }
        let number = number
            .trim()
            .parse::<u32>()
            .map_err(|_| BuildRefParseError::InvalidNumber(number.to_string()))?;
        Ok(Self::new(job, number))
    }
}

// ============================================================================
// RESULT AND CAUSES
// ============================================================================

/// Completion result of a build, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildResult {
    Aborted,
    Failure,
    Unstable,
    Success,
}

impl BuildResult {
    pub fn is_better_or_equal(self, other: BuildResult) -> bool {
        self >= other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildResult::Aborted => "ABORTED",
            BuildResult::Failure => "FAILURE",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a build was started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cause {
    /// Triggered by a build of another job
    Upstream { job: JobId, number: u32 },
    /// Started manually
    User {
        #[serde(default)]
        user_id: Option<String>,
    },
    Timer,
    Other { description: String },
}

impl Cause {
    pub fn upstream(job: impl Into<JobId>, number: u32) -> Self {
        Cause::Upstream {
            job: job.into(),
            number,
        }
    }

    /// The triggering build, if this is an upstream cause
    pub fn upstream_ref(&self) -> Option<BuildRef> {
        match self {
            Cause::Upstream { job, number } => Some(BuildRef::new(job.clone(), *number)),
            _ => None,
        }
    }
}

// ============================================================================
// BUILD
// ============================================================================

/// One build record of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Owning job. Snapshots may omit it; [`crate::Job::with_build`] fills it in.
    #[serde(default)]
    pub job: JobId,
    pub number: u32,
    /// Custom display name; `#<number>` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// `None` while the build is still running
    #[serde(default)]
    pub result: Option<BuildResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<Cause>,
    /// Transitively recorded upstream dependencies: job -> build number
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub upstream_builds: BTreeMap<JobId, u32>,
}

impl Build {
    pub fn new(job: impl Into<JobId>, number: u32) -> Self {
        Self {
            job: job.into(),
            number,
            display_name: None,
            result: None,
            causes: Vec::new(),
            upstream_builds: BTreeMap::new(),
        }
    }

    pub fn with_result(mut self, result: BuildResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.causes.push(cause);
        self
    }

    pub fn with_upstream_build(mut self, job: impl Into<JobId>, number: u32) -> Self {
        self.upstream_builds.insert(job.into(), number);
        self
    }

    pub fn build_ref(&self) -> BuildRef {
        BuildRef::new(self.job.clone(), self.number)
    }

    /// Display name, defaulting to `#<number>`
    pub fn display_name(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => format!("#{}", self.number),
        }
    }

    /// `<job> <display name>`
    pub fn full_display_name(&self) -> String {
        format!("{} {}", self.job, self.display_name())
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Builds referenced by direct upstream causes
    pub fn upstream_causes(&self) -> impl Iterator<Item = BuildRef> + '_ {
        self.causes.iter().filter_map(Cause::upstream_ref)
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_display_name())
    }
}
