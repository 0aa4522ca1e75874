//! Campaign orchestration.
//!
//! A [`Campaign`] takes an ordered list of leads and an instruction and, one
//! lead at a time, composes a message and hands it to the transport. Sends are
//! strictly sequential with a fixed [cooldown](CampaignConfig::cooldown_secs)
//! between them. A lead that fails is marked [`Status::Failed`] and the run
//! moves on; nothing a single lead does can abort the run.
//!
//! ```text
//!   Input ──start_run──▶ Running ──last lead──▶ Done
//!     ▲                     │                    │
//!     └──────── reset ──────┴────────────────────┘
//! ```
//!
//! Progress is available two ways: [`Campaign::subscribe`] yields the latest
//! [`CampaignRun`] snapshot, and [`RunHandle::next_event`] yields every
//! [`ProgressEvent`] in order.

mod campaign;
pub mod cooldown;
mod error;
mod run;
mod status;
mod worker;

pub use campaign::{Campaign, RunHandle};
pub use error::CampaignError;
pub use run::{CampaignRun, Phase};
use serde::{Deserialize, Serialize};
pub use status::{Failure, FailureKind, Status};

/// Campaign pacing.
///
/// ```ron
/// campaign: (
///     cooldown_secs: 120,
///     eta_pad_secs: 5,
///     from_display_name: Some("Jane at Acme"),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignConfig {
    /// Pause between two consecutive sends.
    ///
    /// Default: 120
    #[serde(default = "defaults::cooldown_secs")]
    pub cooldown_secs: u64,

    /// Allowance for the final send in the ETA.
    ///
    /// Default: 5
    #[serde(default = "defaults::eta_pad_secs")]
    pub eta_pad_secs: u64,

    /// Display name for the `From` header, overriding the relay's.
    #[serde(default)]
    pub from_display_name: Option<String>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: defaults::cooldown_secs(),
            eta_pad_secs: defaults::eta_pad_secs(),
            from_display_name: None,
        }
    }
}

mod defaults {
    pub const fn cooldown_secs() -> u64 {
        120
    }

    pub const fn eta_pad_secs() -> u64 {
        5
    }
}

/// Something that happened during a run, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    Sending {
        index: usize,
    },
    Sent {
        index: usize,
        subject: String,
    },
    Failed {
        index: usize,
        kind: FailureKind,
        reason: String,
        /// Present when composition succeeded and delivery did not.
        subject: Option<String>,
    },
    CooldownStarted {
        secs: u64,
    },
    CooldownTick {
        remaining: u64,
    },
    Finished {
        sent: usize,
        failed: usize,
    },
}
