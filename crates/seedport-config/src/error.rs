//! Error types for configuration loading.
//!
//! # Design
//! - Constant error messages; the offending variable and value travel as fields.
//! - Machine-readable `reason` codes keep assertions in tests stable.

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was present but its value could not be accepted.
    #[error("invalid configuration field")]
    InvalidField {
        /// Environment variable that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Two variables were supplied in a combination that cannot be honoured.
    #[error("inconsistent configuration fields")]
    Inconsistent {
        /// First variable involved.
        field: &'static str,
        /// Second variable involved.
        other: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }
}
