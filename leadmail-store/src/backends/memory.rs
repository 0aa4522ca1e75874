use std::{
    collections::HashSet,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use leadmail_common::ResultRecord;

use crate::{ResultsStore, StoreError, check_unique, mark, toggle};

/// Keeps records in a `Vec` behind an `RwLock`. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultsStore {
    records: Arc<RwLock<Vec<ResultRecord>>>,
}

impl MemoryResultsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultsStore for MemoryResultsStore {
    async fn append(&self, record: ResultRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        check_unique(&records, &record.id)?;
        records.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn toggle_replied(&self, id: &str) -> Result<ResultRecord, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        toggle(&mut records, id)
    }

    async fn mark_replied(&self, emails: &HashSet<String>) -> Result<usize, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Ok(mark(&mut records, emails))
    }
}

#[cfg(test)]
mod tests {
    use leadmail_common::Lead;

    use super::*;
    use crate::{Filter, Stats};

    fn record(email: &str) -> ResultRecord {
        ResultRecord::sent(&Lead::new("Name", email, "Company"))
    }

    #[tokio::test]
    async fn append_and_list_in_order() {
        let store = MemoryResultsStore::new();
        store.append(record("a@example.com")).await.unwrap();
        store.append(record("b@example.com")).await.unwrap();

        let emails = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.email)
            .collect::<Vec<_>>();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = MemoryResultsStore::new();
        let r = record("a@example.com");
        store.append(r.clone()).await.unwrap();
        assert!(matches!(
            store.append(r).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn toggle_flips_back_and_forth() {
        let store = MemoryResultsStore::new();
        let r = record("a@example.com");
        let id = r.id.clone();
        store.append(r).await.unwrap();

        assert!(store.toggle_replied(&id).await.unwrap().replied);
        assert!(!store.toggle_replied(&id).await.unwrap().replied);
        assert!(matches!(
            store.toggle_replied("missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mark_replied_matches_case_insensitively() {
        let store = MemoryResultsStore::new();
        store.append(record("Ada@Example.com")).await.unwrap();
        store.append(record("bob@example.com")).await.unwrap();

        let emails = HashSet::from(["ada@example.com".to_string()]);
        assert_eq!(store.mark_replied(&emails).await.unwrap(), 1);
        // Already replied records are not counted twice.
        assert_eq!(store.mark_replied(&emails).await.unwrap(), 0);

        let replied = store.query(Filter::Replied, "").await.unwrap();
        assert_eq!(replied.len(), 1);
        assert_eq!(replied[0].email, "Ada@Example.com");
        assert_eq!(
            store.stats().await.unwrap(),
            Stats {
                total: 2,
                replied: 1,
                no_reply: 1,
                reply_rate: 50
            }
        );
    }
}
