//! Core validation types.
//!
//! ## Overview
//!
//! - **[`ValidationEngine`]**: plans rules and runs them over datasets
//! - **[`Outcome`]**: the verdict of one validator for one row
//! - **[`ValidationResult`]**: the emitted record for one (rule, row) pair
//! - **[`ValidationReport`]**: all results of a run plus [`ValidationMetrics`]
//! - **[`Severity`]** / **[`ResultSeverity`]**: rule and result severities
//! - **[`LogicalOperator`]**: AND / OR between column conditions
//!
//! ## Architecture
//!
//! ```text
//! ValidationEngine::validate
//!     └── per enabled rule: DispatchPath -> plan (RuleKind | ConditionChain)
//!             └── per row: Outcome | GuardError | panic
//!                     └── ValidationResult -> ResultBuffer
//! ```

mod config;
mod engine;
mod logical;
mod outcome;
pub mod result;
mod severity;

pub use config::EngineConfig;
pub use engine::{DispatchPath, ValidationEngine, ValidationEngineBuilder};
pub use logical::LogicalOperator;
pub use outcome::Outcome;
pub use result::{ResultBuffer, ResultKey, ValidationMetrics, ValidationReport, ValidationResult};
pub use severity::{ResultSeverity, Severity};
