use leadmail_common::ValidationError;
use thiserror::Error;

use crate::{Phase, Status};

/// Errors that reach the caller of a campaign.
///
/// Per-lead compose and delivery failures are not here: they end up as a
/// [`Status::Failed`] lead with a [`crate::FailureKind`] and never escape the
/// run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CampaignError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A run is already in progress or finished; reset first.
    #[error("Cannot start a run while the campaign is {0}")]
    NotIdle(Phase),

    #[error("Invalid status transition for lead {index}: {from} -> {to}")]
    InvalidTransition {
        index: usize,
        from: Status,
        to: Status,
    },

    /// The run was reset before it finished.
    #[error("Run was reset before completion")]
    Reset,

    /// The worker task panicked or was aborted.
    #[error("Campaign worker failed: {0}")]
    Worker(String),
}
