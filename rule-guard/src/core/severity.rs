//! Rule and result severities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a rule's failures are.
///
/// Ordered by severity: `Failure > Warning`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth investigating; does not block downstream use
    #[default]
    Warning,
    /// The row is unusable as-is
    #[serde(alias = "error")]
    Failure,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Failure => "failure",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to each emitted result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ResultSeverity {
    #[default]
    Success,
    Warning,
    Failure,
}

impl ResultSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSeverity::Success => "success",
            ResultSeverity::Warning => "warning",
            ResultSeverity::Failure => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultSeverity::Success)
    }
}

impl From<Severity> for ResultSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => ResultSeverity::Warning,
            Severity::Failure => ResultSeverity::Failure,
        }
    }
}

impl fmt::Display for ResultSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Severity::Failure > Severity::Warning);
        assert!(ResultSeverity::Failure > ResultSeverity::Warning);
        assert!(ResultSeverity::Warning > ResultSeverity::Success);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Severity::Failure).unwrap(), "\"failure\"");
        assert_eq!(
            serde_json::from_str::<Severity>("\"error\"").unwrap(),
            Severity::Failure
        );
        assert_eq!(
            serde_json::to_string(&ResultSeverity::Success).unwrap(),
            "\"success\""
        );
    }

    #[test]
    fn test_rule_severity_maps_to_result() {
        assert_eq!(ResultSeverity::from(Severity::Warning), ResultSeverity::Warning);
        assert_eq!(ResultSeverity::from(Severity::Failure).to_string(), "failure");
    }
}
