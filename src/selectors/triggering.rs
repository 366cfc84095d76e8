//! Upstream selection: builds of the target job that triggered the origin
//!
//! The first call walks trigger causes back from the originating build and
//! queues every reachable build of the target job, deduplicated and sorted by
//! number. Later calls pop from that queue, which lives on the context as an
//! [`UpstreamQueue`] extension.

use std::any::Any;
use std::collections::{BTreeSet, HashSet, VecDeque};

use run_model::{Build, BuildRef, Job, JobId};

use crate::context::{CloneableExtension, ContextExtension, ExecutionContext};
use crate::error::ExtensionCloneError;

/// Remaining upstream build numbers for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQueue {
    job: JobId,
    pending: VecDeque<u32>,
}

impl UpstreamQueue {
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl ContextExtension for UpstreamQueue {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_cloneable(&self) -> Option<&dyn CloneableExtension> {
        Some(self)
    }
}

impl CloneableExtension for UpstreamQueue {
    fn clone_extension(&self) -> Result<Box<dyn ContextExtension>, ExtensionCloneError> {
        Ok(Box::new(self.clone()))
    }
}

pub(super) fn next_upstream<'h>(
    include_dependencies: bool,
    use_newest: bool,
    job: &'h Job,
    ctx: &mut ExecutionContext<'h>,
) -> Option<&'h Build> {
    let resuming = ctx.last_match().is_some()
        && ctx
            .with_extension(|q: &mut UpstreamQueue| q.job == job.id)
            .unwrap_or(false);

    if !resuming {
        let Some(origin) = ctx.origin().cloned() else {
            ctx.log_info(format_args!(
                "No originating build, cannot follow upstream causes"
            ));
            return None;
        };
        let numbers = upstream_numbers(job, ctx, &origin, include_dependencies);
        let mut pending: VecDeque<u32> = numbers.into_iter().collect();
        if use_newest {
            pending = pending.into_iter().rev().collect();
        }
        ctx.log_debug(format_args!(
            "{} upstream build(s) of {} triggered {}",
            pending.len(),
            job.id,
            origin
        ));
        ctx.replace_extension(UpstreamQueue {
            job: job.id.clone(),
            pending,
        });
    }

    let next = ctx
        .with_extension(|q: &mut UpstreamQueue| q.pending.pop_front())
        .flatten();
    match next {
        Some(number) => job.build(number),
        None => {
            if let Some(handle) = ctx.get_extension::<UpstreamQueue>() {
                ctx.remove_extension(&handle);
            }
            None
        }
    }
}

/// Numbers of `job`'s builds reachable from `origin` through trigger causes.
fn upstream_numbers(
    job: &Job,
    ctx: &ExecutionContext<'_>,
    origin: &BuildRef,
    include_dependencies: bool,
) -> BTreeSet<u32> {
    let history = ctx.history();
    let mut found = BTreeSet::new();
    let mut visited: HashSet<BuildRef> = HashSet::new();
    let mut pending = vec![origin.clone()];

    while let Some(current) = pending.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(build) = history.build(&current) else {
            ctx.log_debug(format_args!("{} is not in the build history", current));
            continue;
        };

        let mut upstream: Vec<BuildRef> = build.upstream_causes().collect();
        if include_dependencies {
            upstream.extend(
                build
                    .upstream_builds
                    .iter()
                    .map(|(job, number)| BuildRef::new(job.clone(), *number)),
            );
        }

        for parent in upstream {
            if job.answers_to(&parent.job) {
                // A build of the root job stands for the same-numbered build here.
                if job.build(parent.number).is_some() {
                    found.insert(parent.number);
                }
            } else if !visited.contains(&parent) {
                pending.push(parent);
            }
        }
    }
    found
}
