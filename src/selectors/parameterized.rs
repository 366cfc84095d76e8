//! Selector resolved at run time from a parameter
//!
//! The parameter is expanded and then interpreted in this order:
//! 1. starts with `(`: an inline selector expression
//! 2. still starts with `$`: an unresolved variable, nothing is selected
//! 3. otherwise: the name of a variable holding the expression

use run_model::{Build, Job};

use super::Selector;
use crate::codec;
use crate::context::ExecutionContext;
use crate::error::SelectorError;
use crate::variables::is_unresolved;

pub(super) fn next_parameterized<'h>(
    parameter: &str,
    job: &'h Job,
    ctx: &mut ExecutionContext<'h>,
) -> Result<Option<&'h Build>, SelectorError> {
    let Some(selector) = resolve(parameter, ctx) else {
        ctx.log_info(format_args!("No selector was resolved."));
        return Ok(None);
    };
    ctx.nested_mut(|ctx| selector.next_candidate(job, ctx))
        .unwrap_or(Ok(None))
}

fn resolve(parameter: &str, ctx: &ExecutionContext<'_>) -> Option<Selector> {
    if parameter.trim().is_empty() {
        ctx.log_info(format_args!("Parameter name is not specified"));
        return None;
    }

    let expanded = ctx.expand(parameter);
    let expanded = expanded.trim();
    let expression = if expanded.starts_with('(') {
        ctx.log_debug(format_args!("{} is considered a selector expression", parameter));
        expanded.to_string()
    } else if is_unresolved(expanded) {
        ctx.log_debug(format_args!("Unresolved variable {}", expanded));
        return None;
    } else if expanded.is_empty() {
        return None;
    } else {
        ctx.log_debug(format_args!("{} is considered a variable name", expanded));
        match ctx.variables().get(expanded) {
            Some(value) => value.to_string(),
            None => {
                ctx.log_info(format_args!("Variable {} is not defined", expanded));
                return None;
            }
        }
    };

    match codec::decode_selector(&expression) {
        Ok(selector) => Some(selector),
        Err(e) => {
            ctx.log_error(&format!("Failed to resolve selector: {}", expression), &e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BufferConsole;
    use crate::variables::Variables;
    use run_model::{BuildHistory, BuildResult, InMemoryHistory, JobId};
    use std::sync::Arc;

    fn history() -> InMemoryHistory {
        InMemoryHistory::new().with_job(
            Job::new("app")
                .with_build(Build::new("", 1).with_result(BuildResult::Success))
                .with_build(Build::new("", 2).with_result(BuildResult::Failure))
                .with_build(Build::new("", 3).with_result(BuildResult::Success)),
        )
    }

    fn first(parameter: &str, vars: Variables) -> (Option<u32>, Arc<BufferConsole>) {
        let h = history();
        let job = h.job(&JobId::new("app")).unwrap();
        let console = Arc::new(BufferConsole::new());
        let mut ctx = ExecutionContext::new(&h)
            .with_variables(vars)
            .with_console(console.clone())
            .with_verbose(true);
        let picked = next_parameterized(parameter, job, &mut ctx)
            .unwrap()
            .map(|b| b.number);
        (picked, console)
    }

    #[test]
    fn test_inline_expression() {
        let (picked, _) = first(r#"(build-number :number "2")"#, Variables::new());
        assert_eq!(picked, Some(2));
    }

    #[test]
    fn test_variable_reference() {
        let vars = Variables::new().with("SELECTOR", r#"(status :build-status "stable")"#);
        assert_eq!(first("$SELECTOR", vars.clone()).0, Some(3));
        assert_eq!(first("${SELECTOR}", vars.clone()).0, Some(3));
        // a bare name is looked up directly
        assert_eq!(first("SELECTOR", vars).0, Some(3));
    }

    #[test]
    fn test_unresolved_and_missing() {
        let (picked, console) = first("$SELECTOR", Variables::new());
        assert_eq!(picked, None);
        assert!(console.contains("Unresolved variable $SELECTOR"));
        assert!(console.contains("No selector was resolved."));

        let (picked, console) = first("SELECTOR", Variables::new());
        assert_eq!(picked, None);
        assert!(console.contains("Variable SELECTOR is not defined"));
    }

    #[test]
    fn test_blank_parameter_and_value() {
        let (picked, console) = first("  ", Variables::new());
        assert_eq!(picked, None);
        assert!(console.contains("Parameter name is not specified"));

        let (picked, _) = first("$EMPTY", Variables::new().with("EMPTY", ""));
        assert_eq!(picked, None);
    }

    #[test]
    fn test_broken_expression_is_soft() {
        let vars = Variables::new()
            .with("BROKEN", "(status :build-status")
            .with("UNKNOWN", "(no-such-selector)");
        let (picked, console) = first("$BROKEN", vars.clone());
        assert_eq!(picked, None);
        assert!(console.contains("Failed to resolve selector: (status :build-status"));
        assert_eq!(first("$UNKNOWN", vars).0, None);
    }

    #[test]
    fn test_self_reference_terminates() {
        let vars = Variables::new().with("S", r#"(parameterized :parameter "$S")"#);
        assert_eq!(first("$S", vars).0, None);
    }

    #[test]
    fn test_not_a_number_still_propagates() {
        let h = history();
        let job = h.job(&JobId::new("app")).unwrap();
        let mut ctx = ExecutionContext::new(&h);
        let result = next_parameterized(r#"(build-number :number "abc")"#, job, &mut ctx);
        assert!(matches!(result, Err(SelectorError::NotANumber { .. })));
    }
}
