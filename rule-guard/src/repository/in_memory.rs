//! In-memory implementation of [`Repository`] for tests and development.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{Record, Repository};
use crate::error::{GuardError, Result};

/// Stores records in a `Vec` behind a tokio `RwLock`.
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct InMemoryRepository<T> {
    records: Arc<RwLock<Vec<T>>>,
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a repository holding `records`; later duplicates of an id are
    /// dropped.
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let mut unique: Vec<T> = Vec::new();
        for record in records {
            if !unique.iter().any(|r| r.id() == record.id()) {
                unique.push(record);
            }
        }
        Self {
            records: Arc::new(RwLock::new(unique)),
        }
    }

    pub async fn size(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn list(&self) -> Result<Vec<T>> {
        Ok(self.records.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.id() == id)
            .cloned())
    }

    #[instrument(skip(self, record), fields(kind = T::KIND, id = record.id()))]
    async fn add(&self, record: T) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(GuardError::repository(
                "add",
                format!("{} '{}' already exists", T::KIND, record.id()),
            ));
        }
        records.push(record);
        debug!(total = records.len(), "Stored record");
        Ok(())
    }

    #[instrument(skip(self, record), fields(kind = T::KIND, id = record.id()))]
    async fn update(&self, record: T) -> Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(GuardError::NotFound(format!(
                "{} '{}'",
                T::KIND,
                record.id()
            ))),
        }
    }

    #[instrument(skip(self), fields(kind = T::KIND))]
    async fn delete(&self, id: &str) -> Result<T> {
        let mut records = self.records.write().await;
        let position = records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| GuardError::NotFound(format!("{} '{id}'", T::KIND)))?;
        Ok(records.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ValueList;
    use crate::rules::{Rule, RuleType};

    fn rule(id: &str) -> Rule {
        Rule::new(id, "Email required", "users", "email", RuleType::Required)
    }

    #[tokio::test]
    async fn test_in_memory_repository_basic_operations() {
        let repo = InMemoryRepository::new();
        repo.add(rule("a")).await.unwrap();
        repo.add(rule("b")).await.unwrap();

        assert_eq!(repo.size().await, 2);
        assert!(repo.exists("a").await.unwrap());
        assert!(!repo.exists("c").await.unwrap());

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let removed = repo.delete("a").await.unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(repo.size().await, 1);
    }

    #[tokio::test]
    async fn test_in_memory_repository_rejects_duplicates() {
        let repo = InMemoryRepository::new();
        repo.add(rule("a")).await.unwrap();

        let err = repo.add(rule("a")).await.unwrap_err();
        assert!(matches!(err, GuardError::Repository { .. }));
        assert!(err.to_string().contains("rule 'a' already exists"));
    }

    #[tokio::test]
    async fn test_in_memory_repository_update() {
        let repo = InMemoryRepository::new();
        repo.add(rule("a")).await.unwrap();

        repo.update(rule("a").disabled()).await.unwrap();
        assert!(!repo.get("a").await.unwrap().unwrap().enabled);

        let err = repo.update(rule("missing")).await.unwrap_err();
        assert!(matches!(err, GuardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_in_memory_repository_value_lists() {
        let repo = InMemoryRepository::with_records(vec![
            ValueList::new("countries", "ISO countries", vec!["DE".into(), "US".into()]),
            ValueList::new("countries", "duplicate", vec![]),
        ]);
        assert_eq!(repo.size().await, 1);

        let list = repo.get("countries").await.unwrap().unwrap();
        assert!(list.contains("DE"));

        let err = repo.delete("nope").await.unwrap_err();
        assert!(err.to_string().contains("value list 'nope'"));
    }

    #[tokio::test]
    async fn test_in_memory_repository_clones_share_storage() {
        let repo = InMemoryRepository::new();
        let other = repo.clone();
        repo.add(rule("a")).await.unwrap();
        assert_eq!(other.size().await, 1);

        other.clear().await;
        assert_eq!(repo.size().await, 0);
    }
}
