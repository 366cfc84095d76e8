//! Status-chasing selection: latest build with a status, then older ones

use std::fmt;

use run_model::{Build, Job, Permalink};

use crate::context::ExecutionContext;

/// Completion status a [`super::Selector::Status`] chases.
///
/// `Successful` includes unstable builds while `Stable` does not. `Completed`
/// takes any finished build regardless of result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    #[default]
    Stable,
    Successful,
    Unstable,
    Failed,
    Completed,
    Any,
}

impl BuildStatus {
    pub const ALL: [BuildStatus; 6] = [
        BuildStatus::Stable,
        BuildStatus::Successful,
        BuildStatus::Unstable,
        BuildStatus::Failed,
        BuildStatus::Completed,
        BuildStatus::Any,
    ];

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Stable => "stable",
            BuildStatus::Successful => "successful",
            BuildStatus::Unstable => "unstable",
            BuildStatus::Failed => "failed",
            BuildStatus::Completed => "completed",
            BuildStatus::Any => "any",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BuildStatus::Stable => "Stable",
            BuildStatus::Successful => "Stable or Unstable",
            BuildStatus::Unstable => "Unstable",
            BuildStatus::Failed => "Failed",
            BuildStatus::Completed => "Completed",
            BuildStatus::Any => "Any",
        }
    }

    /// Wire names are matched case-insensitively.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }

    /// Permalink whose eligibility rule this status shares
    fn permalink(self) -> Permalink {
        match self {
            BuildStatus::Stable => Permalink::LastStableBuild,
            BuildStatus::Successful => Permalink::LastSuccessfulBuild,
            BuildStatus::Unstable => Permalink::LastUnstableBuild,
            BuildStatus::Failed => Permalink::LastFailedBuild,
            BuildStatus::Completed => Permalink::LastCompletedBuild,
            BuildStatus::Any => Permalink::LastBuild,
        }
    }

    pub fn matches(self, build: &Build) -> bool {
        self.permalink().matches(build)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub(super) fn next_by_status<'h>(
    status: BuildStatus,
    job: &'h Job,
    ctx: &ExecutionContext<'h>,
) -> Option<&'h Build> {
    match ctx.last_match() {
        None => job.last_matching(|b| status.matches(b)),
        Some(previous) => job.previous_matching(previous, |b| status.matches(b)),
    }
}
