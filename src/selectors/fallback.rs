use run_model::{Build, Job};

use super::FallbackEntry;
use crate::context::ExecutionContext;
use crate::error::SelectorError;

/// Runs each entry as a full nested selection on its own copy of the context.
///
/// Yields at most one candidate per selection; the nested runs already applied
/// the caller's filter.
pub(super) fn next_fallback<'h>(
    entries: &[FallbackEntry],
    job: &'h Job,
    ctx: &ExecutionContext<'h>,
) -> Result<Option<&'h Build>, SelectorError> {
    if ctx.last_match().is_some() {
        return Ok(None);
    }

    for entry in entries {
        let mut attempt = ctx.clone();
        attempt.set_last_match(None);
        attempt.set_filter(ctx.filter().narrowed_by(&entry.filter));

        ctx.log_debug(format_args!("Try {}", entry.selector));
        if let Some(build) = entry.selector.select(job, &mut attempt)? {
            return Ok(Some(build));
        }
    }
    Ok(None)
}
