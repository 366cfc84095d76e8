//! Jobs, their ordered build history, and permalinks

use crate::build::{Build, BuildResult, JobId};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Built-in named anchors every job resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permalink {
    LastBuild,
    LastStableBuild,
    LastSuccessfulBuild,
    LastFailedBuild,
    LastUnstableBuild,
    LastUnsuccessfulBuild,
    LastCompletedBuild,
}

impl Permalink {
    pub const ALL: [Permalink; 7] = [
        Permalink::LastBuild,
        Permalink::LastStableBuild,
        Permalink::LastSuccessfulBuild,
        Permalink::LastFailedBuild,
        Permalink::LastUnstableBuild,
        Permalink::LastUnsuccessfulBuild,
        Permalink::LastCompletedBuild,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Permalink::LastBuild => "lastBuild",
            Permalink::LastStableBuild => "lastStableBuild",
            Permalink::LastSuccessfulBuild => "lastSuccessfulBuild",
            Permalink::LastFailedBuild => "lastFailedBuild",
            Permalink::LastUnstableBuild => "lastUnstableBuild",
            Permalink::LastUnsuccessfulBuild => "lastUnsuccessfulBuild",
            Permalink::LastCompletedBuild => "lastCompletedBuild",
        }
    }

    /// Whether `build` is eligible for this anchor
    pub fn matches(self, build: &Build) -> bool {
        match self {
            Permalink::LastBuild => true,
            Permalink::LastStableBuild => build.result == Some(BuildResult::Success),
            Permalink::LastSuccessfulBuild => build
                .result
                .is_some_and(|r| r.is_better_or_equal(BuildResult::Unstable)),
            Permalink::LastFailedBuild => build.result == Some(BuildResult::Failure),
            Permalink::LastUnstableBuild => build.result == Some(BuildResult::Unstable),
            Permalink::LastUnsuccessfulBuild => {
                build.is_complete() && build.result != Some(BuildResult::Success)
            }
            Permalink::LastCompletedBuild => build.is_complete(),
        }
    }
}

impl fmt::Display for Permalink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Permalink {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permalink::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or(())
    }
}

/// A job and its build history, keyed by build number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    /// Parent of a multi-configuration job; its builds count as this job's builds
    /// when walking trigger causes.
    pub root: Option<JobId>,
    builds: BTreeMap<u32, Build>,
    permalinks: BTreeMap<String, u32>,
}

impl Job {
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            root: None,
            builds: BTreeMap::new(),
            permalinks: BTreeMap::new(),
        }
    }

    pub fn with_root(mut self, root: impl Into<JobId>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_build(mut self, build: Build) -> Self {
        self.insert_build(build);
        self
    }

    pub fn with_permalink(mut self, name: impl Into<String>, number: u32) -> Self {
        self.permalinks.insert(name.into(), number);
        self
    }

    /// Adds a build, taking ownership of its job field. Returns the build it replaced.
    pub fn insert_build(&mut self, mut build: Build) -> Option<Build> {
        build.job = self.id.clone();
        self.builds.insert(build.number, build)
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    pub fn build(&self, number: u32) -> Option<&Build> {
        self.builds.get(&number)
    }

    pub fn last_build(&self) -> Option<&Build> {
        self.builds.values().next_back()
    }

    /// Chronological predecessor of `build` within this job
    pub fn previous_build(&self, build: &Build) -> Option<&Build> {
        self.builds.range(..build.number).next_back().map(|(_, b)| b)
    }

    pub fn builds_newest_first(&self) -> impl Iterator<Item = &Build> {
        self.builds.values().rev()
    }

    /// Newest build satisfying `pred`
    pub fn last_matching(&self, pred: impl Fn(&Build) -> bool) -> Option<&Build> {
        self.builds_newest_first().find(|b| pred(b))
    }

    /// Walks the predecessor chain from `build` (exclusive) to the first build
    /// satisfying `pred`.
    pub fn previous_matching(
        &self,
        build: &Build,
        pred: impl Fn(&Build) -> bool,
    ) -> Option<&Build> {
        self.builds
            .range(..build.number)
            .rev()
            .map(|(_, b)| b)
            .find(|b| pred(b))
    }

    /// Resolves a named anchor: built-ins first, then job-defined permalinks.
    pub fn permalink(&self, id: &str) -> Option<&Build> {
        if let Ok(builtin) = id.parse::<Permalink>() {
            return self.last_matching(|b| builtin.matches(b));
        }
        self.permalinks
            .get(id)
            .and_then(|number| self.build(*number))
    }

    pub fn custom_permalinks(&self) -> &BTreeMap<String, u32> {
        &self.permalinks
    }

    /// Whether a build of `job` counts as a build of this job
    pub fn answers_to(&self, job: &JobId) -> bool {
        &self.id == job || self.root.as_ref() == Some(job)
    }
}
