//! Store contract for rules and value lists.
//!
//! The validation engine itself never touches a store: callers load rules and
//! lists from wherever they live and hand them to
//! [`ValidationEngine`](crate::core::ValidationEngine). This module defines the
//! seam persistence layers implement, together with an in-memory store used by
//! tests and demos.

use async_trait::async_trait;

use crate::dataset::ValueList;
use crate::error::Result;
use crate::rules::Rule;

pub mod in_memory;

pub use in_memory::InMemoryRepository;

/// An entity addressable by a string id.
pub trait Record: Clone + Send + Sync + 'static {
    /// Short noun used in error messages, e.g. `"rule"`.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

impl Record for Rule {
    const KIND: &'static str = "rule";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for ValueList {
    const KIND: &'static str = "value list";

    fn id(&self) -> &str {
        &self.id
    }
}

/// CRUD operations over stored records.
///
/// # Example
///
/// ```rust
/// use rule_guard::prelude::*;
/// use rule_guard::repository::{InMemoryRepository, Repository};
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// runtime.block_on(async {
///     let rules: InMemoryRepository<Rule> = InMemoryRepository::new();
///     rules
///         .add(Rule::new("r1", "Email required", "users", "email", RuleType::Required))
///         .await
///         .unwrap();
///
///     let stored = rules.list().await.unwrap();
///     let report = ValidationEngine::new().validate_parts(&Datasets::new(), &stored, &[]);
///     assert_eq!(report.results.len(), 1);
/// });
/// ```
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// All records in insertion order.
    async fn list(&self) -> Result<Vec<T>>;

    /// The record with `id`, if any.
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Repository`](crate::error::GuardError::Repository)
    /// when a record with the same id already exists.
    async fn add(&self, record: T) -> Result<()>;

    /// Replaces the record sharing `record`'s id.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::NotFound`](crate::error::GuardError::NotFound)
    /// when no such record exists.
    async fn update(&self, record: T) -> Result<()>;

    /// Removes and returns the record with `id`.
    async fn delete(&self, id: &str) -> Result<T>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }
}
