//! Build parameter definitions carrying serialized selectors and filters
//!
//! A job can declare a parameter whose value is a selector or filter
//! expression. The value travels as a plain string and is bound into the
//! request's variables, where [`Selector::Parameterized`] and
//! [`Filter::Parameterized`] pick it up.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::DecodeError;
use crate::filters::Filter;
use crate::selectors::Selector;
use crate::variables::Variables;

/// A named parameter value as the host passes it around
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: String,
}

impl ParameterValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn bind_into(&self, variables: &mut Variables) {
        variables.bind(self.name.clone(), self.value.clone());
    }
}

/// Parameter whose value is a selector expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorParameter {
    pub name: String,
    pub description: Option<String>,
    pub default_selector: Selector,
}

impl SelectorParameter {
    pub fn new(name: impl Into<String>, default_selector: Selector) -> Self {
        Self {
            name: name.into(),
            description: None,
            default_selector,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(&self) -> ParameterValue {
        self.value_for(&self.default_selector)
    }

    pub fn value_for(&self, selector: &Selector) -> ParameterValue {
        ParameterValue::new(self.name.clone(), codec::encode_selector(selector))
    }

    /// Accepts `raw` only if it decodes to a selector.
    pub fn create_value(&self, raw: &str) -> Result<ParameterValue, DecodeError> {
        codec::decode_selector(raw)?;
        Ok(ParameterValue::new(self.name.clone(), raw))
    }
}

/// Parameter whose value is a filter expression.
///
/// Values are not validated on creation: a broken value makes the
/// parameterized filter reject every candidate at selection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParameter {
    pub name: String,
    pub description: Option<String>,
    pub default_filter: Filter,
}

impl FilterParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            default_filter: Filter::AcceptAll,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default_filter(mut self, filter: Filter) -> Self {
        self.default_filter = filter;
        self
    }

    pub fn default_value(&self) -> ParameterValue {
        self.value_for(&self.default_filter)
    }

    pub fn value_for(&self, filter: &Filter) -> ParameterValue {
        ParameterValue::new(self.name.clone(), codec::encode_filter(filter))
    }

    pub fn create_value(&self, raw: &str) -> ParameterValue {
        ParameterValue::new(self.name.clone(), raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::BuildStatus;

    #[test]
    fn test_selector_default_value() {
        let param = SelectorParameter::new("UPSTREAM", Selector::status(BuildStatus::Successful))
            .with_description("Which build to copy from");
        let value = param.default_value();
        assert_eq!(value.name, "UPSTREAM");
        assert_eq!(value.value, r#"(status :build-status "successful")"#);
    }

    #[test]
    fn test_selector_create_value_validates() {
        let param = SelectorParameter::new("UPSTREAM", Selector::default());
        assert_eq!(
            param.create_value(r#"(permalink :id "lastBuild")"#).unwrap().value,
            r#"(permalink :id "lastBuild")"#
        );
        assert!(matches!(
            param.create_value("(latest)"),
            Err(DecodeError::UnknownTag { .. })
        ));
    }

    #[test]
    fn test_filter_parameter() {
        let param = FilterParameter::new("FILTER");
        assert_eq!(param.default_value().value, "(accept-all)");
        // stored as given, even when broken
        assert_eq!(param.create_value("(oops").value, "(oops");
        assert_eq!(
            param.value_for(&Filter::display_name("rc")).value,
            r#"(display-name :name "rc")"#
        );
    }

    #[test]
    fn test_bind_into_variables() {
        let mut vars = Variables::new();
        ParameterValue::new("SELECTOR", "(status)").bind_into(&mut vars);
        assert_eq!(vars.get("SELECTOR"), Some("(status)"));
    }
}
