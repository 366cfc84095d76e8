//! Variable bindings and `$NAME` expansion

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// `${NAME}` or `$NAME`
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z0-9_]+)").expect("variable pattern is valid")
});

/// Snapshot of name -> value bindings visible to a selection request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    bindings: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bind(name, value);
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Substitutes every bound `$NAME` / `${NAME}`. References to unbound names
    /// are left in place; see [`is_unresolved`].
    pub fn expand(&self, template: &str) -> String {
        if !template.contains('$') {
            return template.to_string();
        }
        VARIABLE_PATTERN
            .replace_all(template, |caps: &Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.get(name) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        for (k, v) in iter {
            vars.bind(k, v);
        }
        vars
    }
}

/// Whether an expanded template still starts with a variable reference.
///
/// Callers treat such a value as "not configured" rather than a literal.
pub fn is_unresolved(expanded: &str) -> bool {
    expanded.starts_with('$')
}
