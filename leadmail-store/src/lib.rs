//! Results store: every lead that was sent, and whether it replied.
//!
//! The campaign appends a [`ResultRecord`] for each lead that reaches `Sent`.
//! Operators browse the records with a [`Filter`] and free-text search, flip
//! the replied flag by hand, or mark replies found in the mailbox.

mod backends;
mod error;
mod query;

use std::{collections::HashSet, fmt};

use async_trait::async_trait;
pub use backends::{FileResultsStore, MemoryResultsStore};
pub use error::StoreError;
use leadmail_common::ResultRecord;
pub use query::{Filter, Stats, select};

#[async_trait]
pub trait ResultsStore: Send + Sync + fmt::Debug {
    /// Appends a record.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if a record with the same id is stored,
    /// or an I/O or serialization error from the backend.
    async fn append(&self, record: ResultRecord) -> Result<(), StoreError>;

    /// All records in the order they were appended.
    ///
    /// # Errors
    ///
    /// An I/O or serialization error from the backend.
    async fn list(&self) -> Result<Vec<ResultRecord>, StoreError>;

    /// Flips the replied flag of the record with `id` and returns the result.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no record has that id.
    async fn toggle_replied(&self, id: &str) -> Result<ResultRecord, StoreError>;

    /// Marks every record whose address is in `emails` (lower-case) as
    /// replied. Returns how many records changed.
    ///
    /// # Errors
    ///
    /// An I/O or serialization error from the backend.
    async fn mark_replied(&self, emails: &HashSet<String>) -> Result<usize, StoreError>;

    /// Records passing `filter` and `search`, newest first.
    ///
    /// # Errors
    ///
    /// As [`ResultsStore::list`].
    async fn query(&self, filter: Filter, search: &str) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(select(self.list().await?, filter, search))
    }

    /// # Errors
    ///
    /// As [`ResultsStore::list`].
    async fn stats(&self) -> Result<Stats, StoreError> {
        Ok(Stats::of(&self.list().await?))
    }
}

/// Applies `mark_replied` semantics to an in-memory list.
pub(crate) fn mark(records: &mut [ResultRecord], emails: &HashSet<String>) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        if !record.replied && emails.contains(&record.email.to_lowercase()) {
            record.replied = true;
            changed += 1;
        }
    }
    changed
}

pub(crate) fn toggle(records: &mut [ResultRecord], id: &str) -> Result<ResultRecord, StoreError> {
    let record = records
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    record.replied = !record.replied;
    Ok(record.clone())
}

pub(crate) fn check_unique(records: &[ResultRecord], id: &str) -> Result<(), StoreError> {
    if records.iter().any(|r| r.id == id) {
        Err(StoreError::AlreadyExists(id.to_string()))
    } else {
        Ok(())
    }
}
