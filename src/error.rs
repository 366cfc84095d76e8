//! Error types for selection requests and expression decoding.

use run_model::JobId;
use thiserror::Error;

/// Failures a selection request reports to its caller.
///
/// Absence of data (a missing build, an unresolved variable) is never an error
/// here; selectors report it as "no candidate". Only misconfiguration and the
/// final "nothing matched" outcome surface as `SelectorError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// A build-number template resolved to something that is not an integer.
    #[error("'{value}' is not a valid build number")]
    NotANumber {
        /// The expanded template.
        value: String,
    },

    /// The request named no job.
    #[error("job name is not specified")]
    MissingJobName,

    /// The named job is not in the build history.
    #[error("project not found: {0}")]
    JobNotFound(JobId),

    /// The driver ran the selector dry without the filter accepting anything.
    #[error("no build found in '{job}' matching selector {selector} and filter {filter}")]
    NoBuildFound {
        job: JobId,
        /// Display name of the selector.
        selector: String,
        /// Display name of the filter.
        filter: String,
    },

    /// A top-level expression handed to the request could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl SelectorError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotANumber { .. } => "NOT_A_NUMBER",
            Self::MissingJobName => "MISSING_JOB_NAME",
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::NoBuildFound { .. } => "NO_BUILD_FOUND",
            Self::Decode(_) => "DECODE_ERROR",
        }
    }

    /// Whether the request could succeed later without a configuration change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoBuildFound { .. })
    }
}

/// Failures turning expression text into a selector or filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expression is empty")]
    Blank,

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown {kind} tag '{tag}'")]
    UnknownTag {
        /// `selector`, `filter` or `fallback entry`
        kind: &'static str,
        tag: String,
    },

    #[error("({tag}) has no field ':{field}'")]
    UnknownField { tag: String, field: String },

    #[error("({tag}) repeats field ':{field}'")]
    DuplicateField { tag: String, field: String },

    #[error("({tag}) requires field ':{field}'")]
    MissingField { tag: String, field: String },

    #[error("({tag}) field ':{field}' must be {expected}, found {found}")]
    InvalidField {
        tag: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("({tag}) field ':{field}' has unknown value '{value}'")]
    InvalidEnumValue {
        tag: String,
        field: String,
        value: String,
    },
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Blank => "BLANK",
            Self::Syntax(_) => "SYNTAX",
            Self::UnknownTag { .. } => "UNKNOWN_TAG",
            Self::UnknownField { .. } => "UNKNOWN_FIELD",
            Self::DuplicateField { .. } => "DUPLICATE_FIELD",
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::InvalidEnumValue { .. } => "INVALID_ENUM_VALUE",
        }
    }
}

/// A cloneable context extension could not produce its copy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to clone context extension {extension}: {reason}")]
pub struct ExtensionCloneError {
    pub extension: &'static str,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_selector_and_filter() {
        let err = SelectorError::NoBuildFound {
            job: JobId::new("app"),
            selector: "Latest build by status (Stable)".into(),
            filter: "No filter".into(),
        };
        assert_eq!(
            err.to_string(),
            "no build found in 'app' matching selector Latest build by status (Stable) and filter No filter"
        );
        assert_eq!(err.code(), "NO_BUILD_FOUND");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_decode_error_converts() {
        let err: SelectorError = DecodeError::UnknownTag {
            kind: "selector",
            tag: "bogus".into(),
        }
        .into();
        assert_eq!(err.code(), "DECODE_ERROR");
        assert_eq!(err.to_string(), "unknown selector tag 'bogus'");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_a_number_message() {
        let err = SelectorError::NotANumber {
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "'abc' is not a valid build number");
    }
}
