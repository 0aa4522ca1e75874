//! Marks stored results as replied when the lead has written back.

use std::collections::BTreeSet;

use leadmail_common::tracing;
use leadmail_imap::{ImapError, ReplyDetector};
use leadmail_store::{ResultsStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Reply check failed: {0}")]
    Detector(#[from] ImapError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Distinct addresses asked about.
    pub checked: usize,
    /// Of those, how many had mail in the inbox.
    pub found: usize,
    /// Records newly marked replied.
    pub marked: usize,
}

/// Asks `detector` about every lead that has not replied yet and marks the
/// ones it finds.
///
/// Records already marked replied are not rechecked, and nothing is asked of
/// the detector when every record has replied.
///
/// # Errors
///
/// A store failure, or a detector failure that prevented the whole check.
pub async fn sync_replies(
    store: &dyn ResultsStore,
    detector: &dyn ReplyDetector,
) -> Result<SyncReport, SyncError> {
    let pending = store
        .list()
        .await?
        .into_iter()
        .filter(|record| !record.replied)
        .map(|record| record.email.to_lowercase())
        .collect::<BTreeSet<_>>();

    if pending.is_empty() {
        tracing::info!("No unreplied results to check");
        return Ok(SyncReport::default());
    }

    let emails = pending.into_iter().collect::<Vec<_>>();
    let replied = detector.check_replies(&emails).await?;
    let marked = store.mark_replied(&replied).await?;

    tracing::info!(
        checked = emails.len(),
        found = replied.len(),
        marked,
        "Reply sync complete"
    );

    Ok(SyncReport {
        checked: emails.len(),
        found: replied.len(),
        marked,
    })
}
