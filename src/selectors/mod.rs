//! Selector state machine and the driver loop
//!
//! A selector enumerates candidate builds of a job one at a time. The driver
//! ([`Selector::select`]) keeps asking for the next candidate, records it as
//! the context's last match, and stops at the first one the active filter
//! accepts or when the selector runs dry.
//!
//! Selectors never keep their own cursor: multi-call variants resume from the
//! context's last match or from an extension record they attached.

mod fallback;
mod parameterized;
mod specific;
mod status;
mod triggering;

use std::fmt;

use run_model::{Build, Job};

use crate::config::{SelectorSettings, UpstreamOrder};
use crate::context::ExecutionContext;
use crate::error::SelectorError;
use crate::filters::Filter;

pub use status::BuildStatus;
pub use triggering::UpstreamQueue;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Exactly the build with the expanded number. Single-shot.
    ///
    /// Like `DisplayName` and `Permalink`, the template is stored trimmed by
    /// the constructors and written trimmed by the encoder.
    BuildNumber { number: String },
    /// Newest build whose display name equals the expanded template. Single-shot.
    DisplayName { name: String },
    /// Build a named permalink points at. Single-shot.
    Permalink { id: String },
    /// Latest build with the given status, then progressively older ones.
    Status { build_status: BuildStatus },
    /// Builds of the job that triggered the originating build, directly or
    /// through intermediate jobs.
    Triggering {
        allow_upstream_dependencies: bool,
        upstream_strategy: UpstreamStrategy,
    },
    /// Tries each entry's selector and filter in turn.
    Fallback { entries: Vec<FallbackEntry> },
    /// Selector expression taken from a variable or given inline.
    Parameterized { parameter: String },
}

/// Ordering of upstream builds for [`Selector::Triggering`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpstreamStrategy {
    #[default]
    UseGlobalSetting,
    UseOldest,
    UseNewest,
}

impl UpstreamStrategy {
    pub const ALL: [UpstreamStrategy; 3] = [
        UpstreamStrategy::UseGlobalSetting,
        UpstreamStrategy::UseOldest,
        UpstreamStrategy::UseNewest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamStrategy::UseGlobalSetting => "use-global-setting",
            UpstreamStrategy::UseOldest => "use-oldest",
            UpstreamStrategy::UseNewest => "use-newest",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// Whether newer upstream builds come first
    pub fn use_newest(self, settings: &SelectorSettings) -> bool {
        match self {
            UpstreamStrategy::UseOldest => false,
            UpstreamStrategy::UseNewest => true,
            UpstreamStrategy::UseGlobalSetting => {
                settings.global_upstream_strategy == UpstreamOrder::UseNewest
            }
        }
    }
}

/// One attempt of a [`Selector::Fallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEntry {
    pub selector: Selector,
    pub filter: Filter,
}

impl FallbackEntry {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            filter: Filter::AcceptAll,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

impl Default for Selector {
    fn default() -> Self {
        Selector::Status {
            build_status: BuildStatus::Stable,
        }
    }
}

impl Selector {
    pub fn build_number(number: impl AsRef<str>) -> Self {
        Selector::BuildNumber {
            number: number.as_ref().trim().to_string(),
        }
    }

    pub fn display_name(name: impl AsRef<str>) -> Self {
        Selector::DisplayName {
            name: name.as_ref().trim().to_string(),
        }
    }

    pub fn permalink(id: impl AsRef<str>) -> Self {
        Selector::Permalink {
            id: id.as_ref().trim().to_string(),
        }
    }

    pub fn status(build_status: BuildStatus) -> Self {
        Selector::Status { build_status }
    }

    pub fn triggering(allow_upstream_dependencies: bool, strategy: UpstreamStrategy) -> Self {
        Selector::Triggering {
            allow_upstream_dependencies,
            upstream_strategy: strategy,
        }
    }

    pub fn fallback(entries: impl IntoIterator<Item = FallbackEntry>) -> Self {
        Selector::Fallback {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn parameterized(parameter: impl Into<String>) -> Self {
        Selector::Parameterized {
            parameter: parameter.into(),
        }
    }
}

// ============================================================================
// ENUMERATION
// ============================================================================

impl Selector {
    /// Next candidate after the context's last match, or `None` when exhausted.
    ///
    /// Only a malformed build number is an error; every other kind of absence
    /// is logged and reported as `None`.
    pub fn next_candidate<'h>(
        &self,
        job: &'h Job,
        ctx: &mut ExecutionContext<'h>,
    ) -> Result<Option<&'h Build>, SelectorError> {
        match self {
            Selector::BuildNumber { number } => {
                specific::next_specific(number, job, ctx, specific::by_number)
            }
            Selector::DisplayName { name } => {
                specific::next_specific(name, job, ctx, specific::by_display_name)
            }
            Selector::Permalink { id } => {
                specific::next_specific(id, job, ctx, specific::by_permalink)
            }
            Selector::Status { build_status } => {
                Ok(status::next_by_status(*build_status, job, ctx))
            }
            Selector::Triggering {
                allow_upstream_dependencies,
                upstream_strategy,
            } => {
                let use_newest = upstream_strategy.use_newest(ctx.settings());
                Ok(triggering::next_upstream(
                    *allow_upstream_dependencies,
                    use_newest,
                    job,
                    ctx,
                ))
            }
            Selector::Fallback { entries } => fallback::next_fallback(entries, job, ctx),
            Selector::Parameterized { parameter } => {
                parameterized::next_parameterized(parameter, job, ctx)
            }
        }
    }

    /// Runs the pick loop: the first candidate the context's filter accepts.
    ///
    /// Resets the last match first, so a context can be reused for a fresh
    /// selection.
    pub fn select<'h>(
        &self,
        job: &'h Job,
        ctx: &mut ExecutionContext<'h>,
    ) -> Result<Option<&'h Build>, SelectorError> {
        ctx.set_last_match(None);
        loop {
            let candidate = self.next_candidate(job, ctx)?;
            ctx.set_last_match(candidate);

            let Some(candidate) = candidate else {
                ctx.log_debug(format_args!("{}: No more matching builds.", self));
                return Ok(None);
            };
            ctx.log_debug(format_args!(
                "{}: {} found",
                self,
                candidate.full_display_name()
            ));

            if !ctx.filter().is_selectable(candidate, ctx) {
                ctx.log_debug(format_args!(
                    "{}: declined by the filter {}",
                    candidate.full_display_name(),
                    ctx.filter()
                ));
                continue;
            }

            ctx.log_debug(format_args!(
                "{}: satisfied conditions.",
                candidate.full_display_name()
            ));
            return Ok(Some(candidate));
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::BuildNumber { .. } => f.write_str("Specific build number"),
            Selector::DisplayName { .. } => f.write_str("Specific display name"),
            Selector::Permalink { .. } => f.write_str("Permalink"),
            Selector::Status { build_status } => {
                write!(f, "Latest build by status ({})", build_status.label())
            }
            Selector::Triggering { .. } => f.write_str("Upstream build that triggered this job"),
            Selector::Fallback { .. } => f.write_str("Fallback"),
            Selector::Parameterized { .. } => f.write_str("Specified by a build parameter"),
        }
    }
}
