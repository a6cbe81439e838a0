//! Error types for the rule-guard validation engine.
//!
//! All fallible operations in the crate return [`GuardError`]. The
//! orchestrator maps each variant onto a result severity: configuration
//! errors always surface as `failure` results, evaluation errors carry the
//! rule's own severity, and only infrastructure errors abort a run.

use thiserror::Error;

use crate::expr::EvalError;

/// The main error type for rule-guard.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A rule is malformed: missing parameters, bad regex, unknown list, etc.
    #[error("Configuration error in rule '{rule}': {message}")]
    Configuration {
        /// Name of the offending rule
        rule: String,
        /// Detailed error message
        message: String,
    },

    /// An expression failed to parse or evaluate.
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    /// Error when parsing input documents.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error from serde_json.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error when data types don't match expected types.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Error raised by a rule or list store.
    #[error("Repository error during {operation}: {message}")]
    Repository {
        /// Store operation that failed (add, update, delete, ...)
        operation: String,
        /// Detailed error message
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, GuardError>`.
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    /// Creates a configuration error for the named rule.
    pub fn configuration(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Creates a repository error.
    pub fn repository(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Repository {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error stems from rule configuration rather than data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Message suitable for a validation result.
    ///
    /// Configuration errors drop the rule name because the result already
    /// carries it.
    pub fn result_message(&self) -> String {
        match self {
            Self::Configuration { message, .. } => format!("Configuration error: {message}"),
            Self::Evaluation(err) => err.to_string(),
            other => other.to_string(),
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<GuardError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| wrap(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(&f(), e.into()))
    }
}

fn wrap(msg: &str, base: GuardError) -> GuardError {
    match base {
        GuardError::Configuration { rule, message } => GuardError::Configuration {
            rule,
            message: format!("{msg}: {message}"),
        },
        GuardError::Internal(inner) => GuardError::Internal(format!("{msg}: {inner}")),
        other => GuardError::Internal(format!("{msg}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = GuardError::configuration("email format", "missing parameter 'pattern'");
        assert_eq!(
            err.to_string(),
            "Configuration error in rule 'email format': missing parameter 'pattern'"
        );
        assert!(err.is_configuration());
        assert_eq!(
            err.result_message(),
            "Configuration error: missing parameter 'pattern'"
        );
    }

    #[test]
    fn test_evaluation_error_from() {
        let err: GuardError = EvalError::DivisionByZero.into();
        assert!(!err.is_configuration());
        assert_eq!(err.result_message(), "Division by zero");
    }

    #[test]
    fn test_type_mismatch() {
        let err = GuardError::TypeMismatch {
            expected: "Utf8".to_string(),
            found: "Binary".to_string(),
        };
        assert_eq!(err.to_string(), "Type mismatch: expected Utf8, found Binary");
    }

    #[test]
    fn test_error_context_keeps_configuration() {
        fn failing() -> Result<()> {
            Err(GuardError::configuration("r1", "bad regex"))
        }

        let err = failing().context("compiling rule").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("compiling rule: bad regex"));
    }

    #[test]
    fn test_error_context_wraps_others() {
        let parsed: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{");
        let err = parsed.context("loading rules").unwrap_err();
        assert!(matches!(err, GuardError::Internal(_)));
        assert!(err.to_string().contains("loading rules"));
    }
}
