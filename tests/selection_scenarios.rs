//! End-to-end selection scenarios over small in-memory histories

use pretty_assertions::assert_eq;
use std::sync::Arc;

use run_selector::run_model::{
    Build, BuildHistory, BuildRef, BuildResult, Cause, InMemoryHistory, Job, JobId,
};
use run_selector::{
    select, BufferConsole, BuildStatus, ExecutionContext, FallbackEntry, Filter, SelectRun,
    Selector, SelectorError, SelectorSettings, UpstreamOrder, UpstreamQueue, UpstreamStrategy,
    Variables,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// #1 stable, #2 failed, #3 stable, #4 unstable
fn mixed_history() -> InMemoryHistory {
    InMemoryHistory::new().with_job(
        Job::new("app")
            .with_build(Build::new("", 1).with_result(BuildResult::Success))
            .with_build(Build::new("", 2).with_result(BuildResult::Failure))
            .with_build(Build::new("", 3).with_result(BuildResult::Success))
            .with_build(Build::new("", 4).with_result(BuildResult::Unstable)),
    )
}

/// `down#10` was triggered by `up#1`, `up#2` and `up#3`, and again by `up#1`
/// through `mid#5`.
fn trigger_history() -> InMemoryHistory {
    InMemoryHistory::new()
        .with_job(
            Job::new("up")
                .with_build(Build::new("", 1).with_result(BuildResult::Success))
                .with_build(Build::new("", 2).with_result(BuildResult::Success))
                .with_build(Build::new("", 3).with_result(BuildResult::Success))
                .with_build(Build::new("", 4).with_result(BuildResult::Success)),
        )
        .with_job(
            Job::new("mid").with_build(
                Build::new("", 5)
                    .with_result(BuildResult::Success)
                    .with_cause(Cause::upstream("up", 1)),
            ),
        )
        .with_job(
            Job::new("down").with_build(
                Build::new("", 10)
                    .with_cause(Cause::upstream("up", 1))
                    .with_cause(Cause::upstream("up", 2))
                    .with_cause(Cause::upstream("up", 3))
                    .with_cause(Cause::upstream("mid", 5)),
            ),
        )
}

/// Calls `next_candidate` the way the driver does, without a filter.
fn drain<'h>(selector: &Selector, job: &'h Job, ctx: &mut ExecutionContext<'h>) -> Vec<u32> {
    let mut numbers = Vec::new();
    for _ in 0..32 {
        let next = selector.next_candidate(job, ctx).unwrap();
        ctx.set_last_match(next);
        match next {
            Some(build) => numbers.push(build.number),
            None => break,
        }
    }
    numbers
}

fn job<'h>(history: &'h InMemoryHistory, name: &str) -> &'h Job {
    history.job(&JobId::new(name)).unwrap()
}

// ============================================================================
// STATUS
// ============================================================================

#[test]
fn test_stable_chases_backwards() {
    let h = mixed_history();
    let mut ctx = ExecutionContext::new(&h);
    let numbers = drain(&Selector::status(BuildStatus::Stable), job(&h, "app"), &mut ctx);
    assert_eq!(numbers, vec![3, 1]);
}

#[test]
fn test_successful_includes_unstable() {
    let h = mixed_history();
    let mut ctx = ExecutionContext::new(&h);
    let numbers = drain(&Selector::status(BuildStatus::Successful), job(&h, "app"), &mut ctx);
    assert_eq!(numbers, vec![4, 3, 1]);
}

#[test]
fn test_status_with_filter_skips_declined() {
    let h = mixed_history();
    let build = select(
        &h,
        "app",
        Some(Selector::status(BuildStatus::Stable)),
        Some(Filter::negate(Filter::display_name("#3"))),
        Variables::new(),
        false,
    )
    .unwrap();
    assert_eq!(build.number, 1);
}

// ============================================================================
// TRIGGERING
// ============================================================================

#[test]
fn test_triggering_oldest_first() {
    let h = trigger_history();
    let mut ctx = ExecutionContext::new(&h).with_origin(BuildRef::new("down", 10));
    let selector = Selector::triggering(false, UpstreamStrategy::UseOldest);
    assert_eq!(drain(&selector, job(&h, "up"), &mut ctx), vec![1, 2, 3]);
}

#[test]
fn test_triggering_newest_first() {
    let h = trigger_history();
    let mut ctx = ExecutionContext::new(&h).with_origin(BuildRef::new("down", 10));
    let selector = Selector::triggering(false, UpstreamStrategy::UseNewest);
    assert_eq!(drain(&selector, job(&h, "up"), &mut ctx), vec![3, 2, 1]);
}

#[test]
fn test_triggering_global_setting() {
    let h = trigger_history();
    let settings = SelectorSettings::default().with_global_upstream_strategy(UpstreamOrder::UseNewest);
    let mut ctx = ExecutionContext::new(&h)
        .with_origin(BuildRef::new("down", 10))
        .with_settings(Arc::new(settings));
    let selector = Selector::triggering(false, UpstreamStrategy::UseGlobalSetting);
    assert_eq!(drain(&selector, job(&h, "up"), &mut ctx), vec![3, 2, 1]);
}

#[test]
fn test_triggering_queue_is_dropped_when_exhausted() {
    let h = trigger_history();
    let mut ctx = ExecutionContext::new(&h).with_origin(BuildRef::new("down", 10));
    let selector = Selector::triggering(false, UpstreamStrategy::UseOldest);
    let up = job(&h, "up");

    let first = selector.next_candidate(up, &mut ctx).unwrap();
    assert_eq!(first.map(|b| b.number), Some(1));
    ctx.set_last_match(first);
    assert_eq!(
        ctx.with_extension(|q: &mut UpstreamQueue| q.remaining()),
        Some(2)
    );

    drain(&selector, up, &mut ctx);
    assert!(ctx.get_extension::<UpstreamQueue>().is_none());
}

#[test]
fn test_triggering_filter_and_request() {
    let h = trigger_history();
    let mut ctx = ExecutionContext::new(&h).with_origin(BuildRef::new("down", 10));
    let build = SelectRun::new("up")
        .with_selector(Selector::triggering(false, UpstreamStrategy::UseNewest))
        .with_filter(Filter::negate(Filter::display_name("#3")))
        .execute(&mut ctx)
        .unwrap();
    assert_eq!(build.number, 2);
}

// ============================================================================
// SINGLE-SHOT
// ============================================================================

#[test]
fn test_missing_build_number_is_single_shot() {
    let h = mixed_history();
    let app = job(&h, "app");
    let selector = Selector::build_number("7");
    let mut ctx = ExecutionContext::new(&h);

    assert_eq!(selector.next_candidate(app, &mut ctx).unwrap(), None);
    assert_eq!(selector.next_candidate(app, &mut ctx).unwrap(), None);
}

#[test]
fn test_existing_build_number_yields_once() {
    let h = mixed_history();
    let mut ctx = ExecutionContext::new(&h);
    assert_eq!(drain(&Selector::build_number("2"), job(&h, "app"), &mut ctx), vec![2]);
}

#[test]
fn test_build_number_from_variable() {
    let h = mixed_history();
    let build = select(
        &h,
        "app",
        Some(Selector::build_number("${PICK}")),
        None,
        Variables::new().with("PICK", "4"),
        false,
    )
    .unwrap();
    assert_eq!(build.number, 4);
}

#[test]
fn test_not_a_number_is_fatal() {
    let h = mixed_history();
    let err = select(
        &h,
        "app",
        Some(Selector::build_number("abc")),
        Some(Filter::AcceptAll),
        Variables::new(),
        false,
    )
    .unwrap_err();
    assert_eq!(
        err,
        SelectorError::NotANumber {
            value: "abc".into()
        }
    );
}

// ============================================================================
// FALLBACK
// ============================================================================

#[test]
fn test_fallback_second_entry_starts_fresh() {
    let h = InMemoryHistory::new()
        .with_job(
            Job::new("up")
                .with_build(Build::new("", 1).with_result(BuildResult::Success))
                .with_build(Build::new("", 2).with_result(BuildResult::Success))
                .with_build(Build::new("", 3).with_result(BuildResult::Success)),
        )
        .with_job(
            Job::new("down").with_build(
                Build::new("", 10)
                    .with_cause(Cause::upstream("up", 1))
                    .with_cause(Cause::upstream("up", 2)),
            ),
        );
    let console = Arc::new(BufferConsole::new());
    let mut ctx = ExecutionContext::new(&h)
        .with_origin(BuildRef::new("down", 10))
        .with_console(console.clone())
        .with_verbose(true);

    // The first entry walks #1 and #2 and declines both.
    let selector = Selector::fallback([
        FallbackEntry::new(Selector::triggering(false, UpstreamStrategy::UseOldest))
            .with_filter(Filter::display_name("never")),
        FallbackEntry::new(Selector::status(BuildStatus::Stable))
            .with_filter(Filter::display_name("#3")),
    ]);

    let picked = selector.select(job(&h, "up"), &mut ctx).unwrap();
    assert_eq!(picked.map(|b| b.number), Some(3));
    assert!(ctx.extensions().is_empty());
    assert!(console.contains("Try Upstream build that triggered this job"));
    assert!(console.contains("Try Latest build by status (Stable)"));
}

#[test]
fn test_fallback_exhausted_reports_not_found() {
    let h = mixed_history();
    let err = select(
        &h,
        "app",
        Some(Selector::fallback([
            FallbackEntry::new(Selector::build_number("9")),
            FallbackEntry::new(Selector::permalink("lastFailedBuild"))
                .with_filter(Filter::display_name("#1")),
        ])),
        None,
        Variables::new(),
        false,
    )
    .unwrap_err();
    assert_eq!(err.code(), "NO_BUILD_FOUND");
    assert_eq!(
        err.to_string(),
        "no build found in 'app' matching selector Fallback and filter No filter"
    );
}

// ============================================================================
// PARAMETERIZED
// ============================================================================

#[test]
fn test_parameterized_selector_and_filter() {
    let h = mixed_history();
    let vars = Variables::new()
        .with("WHICH", r#"(status :build-status "successful")"#)
        .with("SKIP", r##"(not :filter (display-name :name "#4"))"##);
    let build = select(
        &h,
        "app",
        Some(Selector::parameterized("WHICH")),
        Some(Filter::parameterized("${SKIP}")),
        vars,
        false,
    )
    .unwrap();
    assert_eq!(build.number, 3);
}

#[test]
fn test_parameterized_selector_bad_value_finds_nothing() {
    let h = mixed_history();
    let console = Arc::new(BufferConsole::new());
    let mut ctx = ExecutionContext::new(&h)
        .with_console(console.clone())
        .with_variables(Variables::new().with("WHICH", "(nonsense)"));
    let err = SelectRun::new("app")
        .with_selector(Selector::parameterized("WHICH"))
        .with_filter(Filter::AcceptAll)
        .execute(&mut ctx)
        .unwrap_err();
    assert_eq!(err.code(), "NO_BUILD_FOUND");
    assert!(console.contains("Failed to resolve selector"));
}

#[test]
fn test_parameterized_selector_too_deep_finds_nothing() {
    let h = mixed_history();
    let deep = format!(
        "{}(status){}",
        "(fallback :entries [(entry :selector ".repeat(2000),
        ")])".repeat(2000)
    );
    let console = Arc::new(BufferConsole::new());
    let mut ctx = ExecutionContext::new(&h)
        .with_console(console.clone())
        .with_variables(Variables::new().with("WHICH", deep));
    let err = SelectRun::new("app")
        .with_selector(Selector::parameterized("WHICH"))
        .with_filter(Filter::AcceptAll)
        .execute(&mut ctx)
        .unwrap_err();
    assert_eq!(err.code(), "NO_BUILD_FOUND");
    assert!(console.contains("nesting too deep"));
}
