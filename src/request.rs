//! Selection requests: the caller-facing entry point
//!
//! [`SelectRun`] names a job plus an optional selector and filter, fills in
//! defaults, and runs the driver against a prepared [`ExecutionContext`]. The
//! free function [`select`] covers the common case of a context built from a
//! history and a set of variables.

use run_model::{Build, BuildHistory, JobId};
use tracing::debug;

use crate::codec;
use crate::context::ExecutionContext;
use crate::error::SelectorError;
use crate::filters::Filter;
use crate::selectors::Selector;
use crate::variables::Variables;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectRun {
    job: Option<String>,
    selector: Option<Selector>,
    filter: Option<Filter>,
    verbose: Option<bool>,
}

impl SelectRun {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: Some(job.into()),
            ..Default::default()
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Overrides the context's verbosity for this request
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Decodes user-supplied selector and filter expressions. Failures here are
    /// fatal; blank expressions leave the default in place.
    pub fn with_expressions(
        mut self,
        selector: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Self, SelectorError> {
        if let Some(text) = selector.filter(|s| !s.trim().is_empty()) {
            self.selector = Some(codec::decode_selector(text)?);
        }
        if let Some(text) = filter.filter(|s| !s.trim().is_empty()) {
            self.filter = Some(codec::decode_filter(text)?);
        }
        Ok(self)
    }

    pub fn execute<'h>(&self, ctx: &mut ExecutionContext<'h>) -> Result<&'h Build, SelectorError> {
        let name = self
            .job
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(SelectorError::MissingJobName)?;
        let job_id = JobId::new(name);
        let job = ctx
            .history()
            .job(&job_id)
            .ok_or_else(|| SelectorError::JobNotFound(job_id.clone()))?;

        if let Some(verbose) = self.verbose {
            ctx.set_verbose(verbose);
        }

        let selector = match &self.selector {
            Some(selector) => selector.clone(),
            None => {
                let selector = Selector::default();
                ctx.log_info(format_args!(
                    "No selector is specified. Using the default: {}",
                    selector
                ));
                selector
            }
        };
        let filter = match &self.filter {
            Some(filter) => filter.clone(),
            None => {
                ctx.log_info(format_args!(
                    "No filter is specified. Using the default: {}",
                    Filter::AcceptAll
                ));
                Filter::AcceptAll
            }
        };

        debug!(job = %job_id, selector = %selector, filter = %filter, "Selecting build");
        ctx.set_filter(filter.clone());

        match selector.select(job, ctx)? {
            Some(build) => {
                debug!(build = %build.build_ref(), "Selected build");
                Ok(build)
            }
            None => Err(SelectorError::NoBuildFound {
                job: job_id,
                selector: selector.to_string(),
                filter: filter.to_string(),
            }),
        }
    }
}

/// Selects one build of `job` from `history`.
///
/// Upstream selection needs an originating build; use [`SelectRun`] with a
/// context built by [`ExecutionContext::with_origin`] for that.
pub fn select<'h>(
    history: &'h dyn BuildHistory,
    job: &str,
    selector: Option<Selector>,
    filter: Option<Filter>,
    variables: Variables,
    verbose: bool,
) -> Result<&'h Build, SelectorError> {
    let mut ctx = ExecutionContext::new(history)
        .with_variables(variables)
        .with_verbose(verbose);
    let mut request = SelectRun::new(job);
    request.selector = selector;
    request.filter = filter;
    request.execute(&mut ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BufferConsole;
    use crate::selectors::BuildStatus;
    use run_model::{BuildResult, InMemoryHistory, Job};
    use std::sync::Arc;

    fn history() -> InMemoryHistory {
        InMemoryHistory::new().with_job(
            Job::new("app")
                .with_build(Build::new("", 1).with_result(BuildResult::Success))
                .with_build(Build::new("", 2).with_result(BuildResult::Failure)),
        )
    }

    #[test]
    fn test_defaults_are_announced() {
        let h = history();
        let console = Arc::new(BufferConsole::new());
        let mut ctx = ExecutionContext::new(&h).with_console(console.clone());

        let build = SelectRun::new("app").execute(&mut ctx).unwrap();
        assert_eq!(build.number, 1);
        assert_eq!(
            console.lines(),
            vec![
                "No selector is specified. Using the default: Latest build by status (Stable)",
                "No filter is specified. Using the default: No filter",
            ]
        );
    }

    #[test]
    fn test_missing_and_unknown_job() {
        let h = history();
        let mut ctx = ExecutionContext::new(&h);
        assert_eq!(
            SelectRun::default().execute(&mut ctx),
            Err(SelectorError::MissingJobName)
        );
        assert_eq!(
            SelectRun::new("  ").execute(&mut ctx),
            Err(SelectorError::MissingJobName)
        );
        assert_eq!(
            SelectRun::new("ghost").execute(&mut ctx),
            Err(SelectorError::JobNotFound(JobId::new("ghost")))
        );
    }

    #[test]
    fn test_not_found_names_selector_and_filter() {
        let h = history();
        let err = select(
            &h,
            "app",
            Some(Selector::status(BuildStatus::Failed)),
            Some(Filter::display_name("#9")),
            Variables::new(),
            false,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SelectorError::NoBuildFound {
                job: JobId::new("app"),
                selector: "Latest build by status (Failed)".into(),
                filter: "Display name".into(),
            }
        );
    }

    #[test]
    fn test_expressions_decode_or_fail() {
        let request = SelectRun::new("app")
            .with_expressions(Some(r#"(build-number :number "$N")"#), Some("  "))
            .unwrap();
        let h = history();
        let mut ctx =
            ExecutionContext::new(&h).with_variables(Variables::new().with("N", "2"));
        assert_eq!(request.execute(&mut ctx).unwrap().number, 2);

        assert!(matches!(
            SelectRun::new("app").with_expressions(Some("(bogus)"), None),
            Err(SelectorError::Decode(_))
        ));
    }
}
