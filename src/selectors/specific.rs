//! Single-shot selectors: one lookup keyed by an expanded template

use run_model::{Build, Job};

use crate::context::ExecutionContext;
use crate::error::SelectorError;
use crate::variables::is_unresolved;

type Lookup<'h> = fn(&'h Job, &str) -> Result<Option<&'h Build>, SelectorError>;

/// Offers at most one candidate: nothing once the driver has a last match.
pub(super) fn next_specific<'h>(
    template: &str,
    job: &'h Job,
    ctx: &ExecutionContext<'h>,
    lookup: Lookup<'h>,
) -> Result<Option<&'h Build>, SelectorError> {
    if ctx.last_match().is_some() {
        return Ok(None);
    }

    let key = ctx.expand(template);
    if is_unresolved(&key) {
        ctx.log_debug(format_args!("Unresolved variable {}", key));
        return Ok(None);
    }

    let found = lookup(job, &key)?;
    if found.is_none() {
        ctx.log_debug(format_args!("No such build {} in {}", key, job.id));
    }
    Ok(found)
}

pub(super) fn by_number<'h>(job: &'h Job, key: &str) -> Result<Option<&'h Build>, SelectorError> {
    let number: i64 = key
        .trim()
        .parse()
        .map_err(|_| SelectorError::NotANumber {
            value: key.to_string(),
        })?;
    // Negative or oversized numbers are well-formed but can't exist.
    Ok(u32::try_from(number).ok().and_then(|n| job.build(n)))
}

/// Newest build with the display name
pub(super) fn by_display_name<'h>(
    job: &'h Job,
    key: &str,
) -> Result<Option<&'h Build>, SelectorError> {
    Ok(job.builds_newest_first().find(|b| b.display_name() == key))
}

pub(super) fn by_permalink<'h>(job: &'h Job, key: &str) -> Result<Option<&'h Build>, SelectorError> {
    Ok(job.permalink(key))
}
