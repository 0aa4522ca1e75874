use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use leadmail_common::ResultRecord;
use tokio::sync::Mutex;

use crate::{ResultsStore, StoreError, check_unique, mark, toggle};

/// Stores records as a JSON array in a single file.
///
/// Every change reads the file, applies the change and writes it back through
/// a temporary file and a rename, so a crash never leaves a half-written
/// document. A missing file reads as an empty store.
#[derive(Debug)]
pub struct FileResultsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileResultsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<ResultRecord>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &[ResultRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::trace!(path = %self.path.display(), count = records.len(), "Saved results");
        Ok(())
    }
}

#[async_trait]
impl ResultsStore for FileResultsStore {
    async fn append(&self, record: ResultRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        check_unique(&records, &record.id)?;
        records.push(record);
        self.save(&records).await
    }

    async fn list(&self) -> Result<Vec<ResultRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn toggle_replied(&self, id: &str) -> Result<ResultRecord, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let updated = toggle(&mut records, id)?;
        self.save(&records).await?;
        Ok(updated)
    }

    async fn mark_replied(&self, emails: &HashSet<String>) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let changed = mark(&mut records, emails);
        if changed > 0 {
            self.save(&records).await?;
        }
        Ok(changed)
    }
}
