//! Verdict returned by a single validator.

use serde::{Deserialize, Serialize};

/// The result of evaluating one rule (or one condition) against one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Whether the row satisfies the rule
    pub is_valid: bool,
    /// Why the row failed; `None` for passes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Column that caused the failure when it differs from the rule's column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Outcome {
    /// Creates a passing outcome.
    pub fn pass() -> Self {
        Self {
            is_valid: true,
            message: None,
            column: None,
        }
    }

    /// Creates a failing outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            column: None,
        }
    }

    /// Passes when `ok`, otherwise fails with the lazily built message.
    pub fn check<F>(ok: bool, message: F) -> Self
    where
        F: FnOnce() -> String,
    {
        if ok {
            Self::pass()
        } else {
            Self::fail(message())
        }
    }

    /// Attributes the outcome to a column.
    pub fn on_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        !self.is_valid
    }
}
