//! Filter algebra
//!
//! A filter decides whether a candidate build offered by a selector is
//! acceptable. Leaf filters test the build; combinators evaluate their children
//! and log each decision through the context.

use std::fmt;

use run_model::Build;

use crate::codec;
use crate::context::ExecutionContext;
use crate::variables::is_unresolved;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Filter {
    /// Accepts every build. The unconfigured default and the identity of `And`.
    #[default]
    AcceptAll,
    /// Accepts builds whose display name equals the expanded template.
    /// Surrounding whitespace is not significant; encoding trims it.
    DisplayName { name: String },
    /// Accepts when every child accepts; empty accepts everything.
    And(Vec<Filter>),
    /// Accepts when any child accepts; empty rejects everything.
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Filter expression read from a variable at evaluation time.
    Parameterized { parameter: String },
}

impl Filter {
    pub fn display_name(name: impl AsRef<str>) -> Self {
        Filter::DisplayName {
            name: name.as_ref().trim().to_string(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn negate(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    pub fn parameterized(parameter: impl Into<String>) -> Self {
        Filter::Parameterized {
            parameter: parameter.into(),
        }
    }

    pub fn is_accept_all(&self) -> bool {
        matches!(self, Filter::AcceptAll)
    }

    /// Conjunction of `self` and `other` that skips `AcceptAll` on either side.
    pub fn narrowed_by(&self, other: &Filter) -> Filter {
        if other.is_accept_all() {
            self.clone()
        } else if self.is_accept_all() {
            other.clone()
        } else {
            Filter::And(vec![self.clone(), other.clone()])
        }
    }

    /// Human-readable name used in console output
    pub fn label(&self) -> &'static str {
        match self {
            Filter::AcceptAll => "No filter",
            Filter::DisplayName { .. } => "Display name",
            Filter::And(_) => "And",
            Filter::Or(_) => "Or",
            Filter::Not(_) => "Not",
            Filter::Parameterized { .. } => "Parameterized filter",
        }
    }

    pub fn is_selectable(&self, candidate: &Build, ctx: &ExecutionContext<'_>) -> bool {
        match self {
            Filter::AcceptAll => true,

            Filter::DisplayName { name } => {
                let expected = ctx.expand(name);
                if is_unresolved(&expected) {
                    ctx.log_debug(format_args!("Unresolved variable {}", expected));
                    return false;
                }
                expected == candidate.display_name()
            }

            Filter::And(filters) => {
                for filter in filters {
                    if !filter.is_selectable(candidate, ctx) {
                        ctx.log_debug(format_args!(
                            "{}: declined by the filter {} (in {})",
                            candidate.full_display_name(),
                            filter,
                            self
                        ));
                        return false;
                    }
                }
                true
            }

            Filter::Or(filters) => {
                for filter in filters {
                    if filter.is_selectable(candidate, ctx) {
                        ctx.log_debug(format_args!(
                            "{}: accepted by the filter {} (in {})",
                            candidate.full_display_name(),
                            filter,
                            self
                        ));
                        return true;
                    }
                }
                false
            }

            Filter::Not(filter) => {
                let result = filter.is_selectable(candidate, ctx);
                ctx.log_debug(format_args!(
                    "{}: result of {} is reverted: {} -> {}",
                    candidate.full_display_name(),
                    filter,
                    result,
                    !result
                ));
                !result
            }

            Filter::Parameterized { parameter } => {
                let expression = ctx.expand(parameter);
                ctx.log_debug(format_args!("{}: Expanded filter: {}", self, expression));
                if expression.trim().is_empty() {
                    ctx.log_debug(format_args!("{}: No filter is specified", self));
                    return true;
                }
                if is_unresolved(&expression) {
                    ctx.log_debug(format_args!("Unresolved variable {}", expression));
                    return false;
                }
                match codec::decode_filter(&expression) {
                    Ok(filter) => ctx
                        .nested(|ctx| filter.is_selectable(candidate, ctx))
                        .unwrap_or(false),
                    Err(e) => {
                        ctx.log_error(&format!("Failed to resolve filter: {}", expression), &e);
                        false
                    }
                }
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
