//! Serialization codec for selectors and filters
//!
//! Maps the typed [`Selector`] and [`Filter`] trees to and from the expression
//! text of the `selector-expr` crate. Every variant has one canonical tag plus
//! short aliases, listed in static tables below; decoding accepts any of them
//! and encoding always writes the canonical one.
//!
//! | Filter | Fields |
//! |---|---|
//! | `(accept-all)` | |
//! | `(display-name :name "..")` | |
//! | `(and :filters [..])` | |
//! | `(or :filters [..])` | |
//! | `(not :filter (..))` | |
//! | `(parameterized :parameter "..")` | |
//!
//! | Selector | Fields |
//! |---|---|
//! | `(build-number :number "..")` | integer also accepted |
//! | `(display-name :name "..")` | |
//! | `(permalink :id "..")` | |
//! | `(status :build-status "..")` | default `stable` |
//! | `(triggering :allow-upstream-dependencies b :upstream-strategy "..")` | both optional |
//! | `(fallback :entries [(entry :selector (..) :filter (..))])` | entry filter optional |
//! | `(parameterized :parameter "..")` | |

use selector_expr::{parse_expr, Expr, Value, MAX_NESTING_DEPTH};

use crate::error::DecodeError;
use crate::filters::Filter;
use crate::selectors::{BuildStatus, FallbackEntry, Selector, UpstreamStrategy};

// ============================================================================
// TAG TABLES
// ============================================================================

struct TagSpec<K> {
    kind: K,
    tag: &'static str,
    aliases: &'static [&'static str],
    fields: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    AcceptAll,
    DisplayName,
    And,
    Or,
    Not,
    Parameterized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectorKind {
    BuildNumber,
    DisplayName,
    Permalink,
    Status,
    Triggering,
    Fallback,
    Parameterized,
}

const FILTER_TAGS: &[TagSpec<FilterKind>] = &[
    TagSpec {
        kind: FilterKind::AcceptAll,
        tag: "accept-all",
        aliases: &["acceptAll", "no-filter", "noFilter"],
        fields: &[],
    },
    TagSpec {
        kind: FilterKind::DisplayName,
        tag: "display-name",
        aliases: &["displayName"],
        fields: &["name"],
    },
    TagSpec {
        kind: FilterKind::And,
        tag: "and",
        aliases: &["andFilter"],
        fields: &["filters"],
    },
    TagSpec {
        kind: FilterKind::Or,
        tag: "or",
        aliases: &["orFilter"],
        fields: &["filters"],
    },
    TagSpec {
        kind: FilterKind::Not,
        tag: "not",
        aliases: &["notFilter"],
        fields: &["filter"],
    },
    TagSpec {
        kind: FilterKind::Parameterized,
        tag: "parameterized",
        aliases: &["parameterizedFilter"],
        fields: &["parameter"],
    },
];

const SELECTOR_TAGS: &[TagSpec<SelectorKind>] = &[
    TagSpec {
        kind: SelectorKind::BuildNumber,
        tag: "build-number",
        aliases: &["buildNumber"],
        fields: &["number"],
    },
    TagSpec {
        kind: SelectorKind::DisplayName,
        tag: "display-name",
        aliases: &["displayName"],
        fields: &["name"],
    },
    TagSpec {
        kind: SelectorKind::Permalink,
        tag: "permalink",
        aliases: &[],
        fields: &["id"],
    },
    TagSpec {
        kind: SelectorKind::Status,
        tag: "status",
        aliases: &["lastWithStatus"],
        fields: &["build-status"],
    },
    TagSpec {
        kind: SelectorKind::Triggering,
        tag: "triggering",
        aliases: &["upstream"],
        fields: &["allow-upstream-dependencies", "upstream-strategy"],
    },
    TagSpec {
        kind: SelectorKind::Fallback,
        tag: "fallback",
        aliases: &[],
        fields: &["entries"],
    },
    TagSpec {
        kind: SelectorKind::Parameterized,
        tag: "parameterized",
        aliases: &["parameterizedSelector"],
        fields: &["parameter"],
    },
];

const ENTRY_TAG: &str = "entry";
const ENTRY_FIELDS: &[&str] = &["selector", "filter"];

fn lookup<K: 'static>(table: &'static [TagSpec<K>], tag: &str) -> Option<&'static TagSpec<K>> {
    table
        .iter()
        .find(|spec| spec.tag == tag || spec.aliases.iter().any(|alias| *alias == tag))
}

fn canonical_tag<K: PartialEq + 'static>(table: &'static [TagSpec<K>], kind: K) -> &'static str {
    table
        .iter()
        .find(|spec| spec.kind == kind)
        .map(|spec| spec.tag)
        .unwrap_or_default()
}

// ============================================================================
// PUBLIC API
// ============================================================================

pub fn decode_filter(text: &str) -> Result<Filter, DecodeError> {
    filter_from_expr(&parse_text(text)?, 1)
}

pub fn decode_selector(text: &str) -> Result<Selector, DecodeError> {
    selector_from_expr(&parse_text(text)?, 1)
}

pub fn encode_filter(filter: &Filter) -> String {
    filter_to_expr(filter).to_expr_string()
}

pub fn encode_selector(selector: &Selector) -> String {
    selector_to_expr(selector).to_expr_string()
}

fn parse_text(text: &str) -> Result<Expr, DecodeError> {
    if text.trim().is_empty() {
        return Err(DecodeError::Blank);
    }
    parse_expr(text).map_err(DecodeError::Syntax)
}

/// Typed decoding recurses once per nested expression; it keeps to the same
/// bound as the parser.
fn check_depth(expr: &Expr, depth: usize) -> Result<(), DecodeError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(DecodeError::Syntax(format!(
            "({}) is nested deeper than {} levels",
            expr.tag, MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

// ============================================================================
// FIELD ACCESS
// ============================================================================

/// Checked view of one expression's arguments
struct Fields<'a> {
    expr: &'a Expr,
}

impl<'a> Fields<'a> {
    /// Rejects keys outside `allowed` and repeated keys.
    fn new(expr: &'a Expr, allowed: &[&str]) -> Result<Self, DecodeError> {
        for (i, key) in expr.keys().enumerate() {
            if !allowed.iter().any(|field| *field == key) {
                return Err(DecodeError::UnknownField {
                    tag: expr.tag.clone(),
                    field: key.to_string(),
                });
            }
            if expr.keys().take(i).any(|k| k == key) {
                return Err(DecodeError::DuplicateField {
                    tag: expr.tag.clone(),
                    field: key.to_string(),
                });
            }
        }
        Ok(Self { expr })
    }

    /// Value of `key`, with `nil` treated as absent
    fn optional(&self, key: &str) -> Option<&'a Value> {
        self.expr.get(key).filter(|v| !v.is_null())
    }

    fn required(&self, key: &str) -> Result<&'a Value, DecodeError> {
        self.optional(key).ok_or_else(|| DecodeError::MissingField {
            tag: self.expr.tag.clone(),
            field: key.to_string(),
        })
    }

    fn invalid(&self, key: &str, expected: &'static str, found: &Value) -> DecodeError {
        DecodeError::InvalidField {
            tag: self.expr.tag.clone(),
            field: key.to_string(),
            expected,
            found: found.type_name(),
        }
    }

    fn string(&self, key: &str) -> Result<String, DecodeError> {
        let value = self.required(key)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(key, "a string", value))
    }

    fn string_or_integer(&self, key: &str) -> Result<String, DecodeError> {
        let value = self.required(key)?;
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            other => Err(self.invalid(key, "a string or integer", other)),
        }
    }

    fn boolean_or(&self, key: &str, default: bool) -> Result<bool, DecodeError> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value
                .as_boolean()
                .ok_or_else(|| self.invalid(key, "a boolean", value)),
        }
    }

    fn expr(&self, key: &str) -> Result<&'a Expr, DecodeError> {
        let value = self.required(key)?;
        value
            .as_expr()
            .ok_or_else(|| self.invalid(key, "an expression", value))
    }

    /// List of expressions; absent means empty
    fn expr_list(&self, key: &str) -> Result<Vec<&'a Expr>, DecodeError> {
        let Some(value) = self.optional(key) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_list()
            .ok_or_else(|| self.invalid(key, "a list", value))?;
        items
            .iter()
            .map(|item| {
                item.as_expr()
                    .ok_or_else(|| self.invalid(key, "a list of expressions", item))
            })
            .collect()
    }

    /// Enum-valued string field; absent means `default`
    fn enumerated<T>(
        &self,
        key: &str,
        default: T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, DecodeError> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        let text = value
            .as_str()
            .ok_or_else(|| self.invalid(key, "a string", value))?;
        parse(text).ok_or_else(|| DecodeError::InvalidEnumValue {
            tag: self.expr.tag.clone(),
            field: key.to_string(),
            value: text.to_string(),
        })
    }
}

// ============================================================================
// FILTERS
// ============================================================================

fn filter_from_expr(expr: &Expr, depth: usize) -> Result<Filter, DecodeError> {
    check_depth(expr, depth)?;
    let spec = lookup(FILTER_TAGS, &expr.tag).ok_or_else(|| DecodeError::UnknownTag {
        kind: "filter",
        tag: expr.tag.clone(),
    })?;
    let fields = Fields::new(expr, spec.fields)?;

    Ok(match spec.kind {
        FilterKind::AcceptAll => Filter::AcceptAll,
        FilterKind::DisplayName => Filter::display_name(fields.string("name")?),
        FilterKind::And => Filter::And(filter_list(&fields, depth)?),
        FilterKind::Or => Filter::Or(filter_list(&fields, depth)?),
        FilterKind::Not => Filter::negate(filter_from_expr(fields.expr("filter")?, depth + 1)?),
        FilterKind::Parameterized => Filter::parameterized(fields.string("parameter")?),
    })
}

fn filter_list(fields: &Fields<'_>, depth: usize) -> Result<Vec<Filter>, DecodeError> {
    fields
        .expr_list("filters")?
        .into_iter()
        .map(|item| filter_from_expr(item, depth + 1))
        .collect()
}

fn filter_to_expr(filter: &Filter) -> Expr {
    let tag = |kind| Expr::new(canonical_tag(FILTER_TAGS, kind));
    match filter {
        Filter::AcceptAll => tag(FilterKind::AcceptAll),
        Filter::DisplayName { name } => tag(FilterKind::DisplayName).with_arg("name", name.trim()),
        Filter::And(filters) => tag(FilterKind::And).with_arg("filters", filter_values(filters)),
        Filter::Or(filters) => tag(FilterKind::Or).with_arg("filters", filter_values(filters)),
        Filter::Not(inner) => tag(FilterKind::Not).with_arg("filter", filter_to_expr(inner)),
        Filter::Parameterized { parameter } => {
            tag(FilterKind::Parameterized).with_arg("parameter", parameter.as_str())
        }
    }
}

fn filter_values(filters: &[Filter]) -> Vec<Value> {
    filters.iter().map(|f| Value::from(filter_to_expr(f))).collect()
}

// ============================================================================
// SELECTORS
// ============================================================================

fn selector_from_expr(expr: &Expr, depth: usize) -> Result<Selector, DecodeError> {
    check_depth(expr, depth)?;
    let spec = lookup(SELECTOR_TAGS, &expr.tag).ok_or_else(|| DecodeError::UnknownTag {
        kind: "selector",
        tag: expr.tag.clone(),
    })?;
    let fields = Fields::new(expr, spec.fields)?;

    Ok(match spec.kind {
        SelectorKind::BuildNumber => Selector::build_number(fields.string_or_integer("number")?),
        SelectorKind::DisplayName => Selector::display_name(fields.string("name")?),
        SelectorKind::Permalink => Selector::permalink(fields.string("id")?),
        SelectorKind::Status => Selector::status(fields.enumerated(
            "build-status",
            BuildStatus::default(),
            BuildStatus::from_str_opt,
        )?),
        SelectorKind::Triggering => Selector::triggering(
            fields.boolean_or("allow-upstream-dependencies", false)?,
            fields.enumerated(
                "upstream-strategy",
                UpstreamStrategy::default(),
                UpstreamStrategy::from_str_opt,
            )?,
        ),
        SelectorKind::Fallback => Selector::fallback(
            fields
                .expr_list("entries")?
                .into_iter()
                .map(|entry| entry_from_expr(entry, depth + 1))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        SelectorKind::Parameterized => Selector::parameterized(fields.string("parameter")?),
    })
}

fn entry_from_expr(expr: &Expr, depth: usize) -> Result<FallbackEntry, DecodeError> {
    check_depth(expr, depth)?;
    if expr.tag != ENTRY_TAG {
        return Err(DecodeError::UnknownTag {
            kind: "fallback entry",
            tag: expr.tag.clone(),
        });
    }
    let fields = Fields::new(expr, ENTRY_FIELDS)?;
    let selector = selector_from_expr(fields.expr("selector")?, depth + 1)?;
    let filter = match fields.optional("filter") {
        None => Filter::AcceptAll,
        Some(_) => filter_from_expr(fields.expr("filter")?, depth + 1)?,
    };
    Ok(FallbackEntry::new(selector).with_filter(filter))
}

fn selector_to_expr(selector: &Selector) -> Expr {
    let tag = |kind| Expr::new(canonical_tag(SELECTOR_TAGS, kind));
    match selector {
        Selector::BuildNumber { number } => {
            tag(SelectorKind::BuildNumber).with_arg("number", number.trim())
        }
        Selector::DisplayName { name } => {
            tag(SelectorKind::DisplayName).with_arg("name", name.trim())
        }
        Selector::Permalink { id } => tag(SelectorKind::Permalink).with_arg("id", id.trim()),
        Selector::Status { build_status } => {
            tag(SelectorKind::Status).with_arg("build-status", build_status.as_str())
        }
        Selector::Triggering {
            allow_upstream_dependencies,
            upstream_strategy,
        } => tag(SelectorKind::Triggering)
            .with_arg("allow-upstream-dependencies", *allow_upstream_dependencies)
            .with_arg("upstream-strategy", upstream_strategy.as_str()),
        Selector::Fallback { entries } => {
            let entries: Vec<Value> = entries
                .iter()
                .map(|entry| {
                    Value::from(
                        Expr::new(ENTRY_TAG)
                            .with_arg("selector", selector_to_expr(&entry.selector))
                            .with_arg("filter", filter_to_expr(&entry.filter)),
                    )
                })
                .collect();
            tag(SelectorKind::Fallback).with_arg("entries", entries)
        }
        Selector::Parameterized { parameter } => {
            tag(SelectorKind::Parameterized).with_arg("parameter", parameter.as_str())
        }
    }
}
