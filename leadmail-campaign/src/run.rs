use std::fmt;

use leadmail_common::Lead;

use crate::{
    CampaignConfig, CampaignError,
    status::{Failure, FailureKind, Status},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No run; leads and instruction are still being gathered.
    #[default]
    Input,
    Running,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Running => "running",
            Self::Done => "done",
        })
    }
}

/// Everything known about one campaign run.
///
/// The per-lead vectors are index-aligned with `leads`. Only the campaign
/// worker mutates a run; everyone else sees clones published through the
/// campaign's watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRun {
    /// Changes on every start and reset, so a stale worker can tell it has
    /// been replaced.
    pub run_id: u64,
    pub phase: Phase,
    pub leads: Vec<Lead>,
    pub instruction: String,
    pub statuses: Vec<Status>,
    pub subjects: Vec<Option<String>>,
    pub failures: Vec<Option<Failure>>,
    pub active_index: Option<usize>,
    pub elapsed_secs: u64,
    /// Seconds left in the current cooldown, `None` when not cooling down.
    pub cooldown_remaining: Option<u64>,
    cooldown_secs: u64,
    eta_pad_secs: u64,
}

impl CampaignRun {
    /// The empty `Input` state.
    #[must_use]
    pub const fn idle(run_id: u64) -> Self {
        Self {
            run_id,
            phase: Phase::Input,
            leads: Vec::new(),
            instruction: String::new(),
            statuses: Vec::new(),
            subjects: Vec::new(),
            failures: Vec::new(),
            active_index: None,
            elapsed_secs: 0,
            cooldown_remaining: None,
            cooldown_secs: 0,
            eta_pad_secs: 0,
        }
    }

    pub(crate) fn start(
        run_id: u64,
        leads: Vec<Lead>,
        instruction: String,
        config: &CampaignConfig,
    ) -> Self {
        let n = leads.len();
        Self {
            run_id,
            phase: Phase::Running,
            leads,
            instruction,
            statuses: vec![Status::Pending; n],
            subjects: vec![None; n],
            failures: vec![None; n],
            active_index: None,
            elapsed_secs: 0,
            cooldown_remaining: None,
            cooldown_secs: config.cooldown_secs,
            eta_pad_secs: config.eta_pad_secs,
        }
    }

    fn count(&self, status: Status) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.count(Status::Sent)
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(Status::Failed)
    }

    #[must_use]
    pub fn done_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_terminal()).count()
    }

    #[must_use]
    pub const fn is_cooling_down(&self) -> bool {
        self.cooldown_remaining.is_some()
    }

    /// Estimated seconds until the run finishes.
    ///
    /// One cooldown per lead still to go after the current one, plus a fixed
    /// allowance for the last send. `None` until the first send starts and
    /// once the run is over.
    #[must_use]
    pub fn eta_secs(&self) -> Option<u64> {
        if self.phase != Phase::Running || self.active_index.is_none() {
            return None;
        }

        let ahead = self
            .leads
            .len()
            .saturating_sub(self.done_count())
            .saturating_sub(1) as u64;
        Some(
            ahead
                .saturating_mul(self.cooldown_secs)
                .saturating_add(self.eta_pad_secs),
        )
    }

    /// Leads that ended `Failed`, in run order.
    #[must_use]
    pub fn failed_leads(&self) -> Vec<Lead> {
        self.leads
            .iter()
            .zip(&self.statuses)
            .filter(|(_, status)| **status == Status::Failed)
            .map(|(lead, _)| lead.clone())
            .collect()
    }

    /// The index allowed to leave `Pending` next.
    const fn cursor(&self) -> usize {
        match self.active_index {
            Some(i) => i + 1,
            None => 0,
        }
    }

    fn transition(&mut self, index: usize, to: Status) -> Result<(), CampaignError> {
        let from = self
            .statuses
            .get(index)
            .copied()
            .ok_or(CampaignError::InvalidTransition {
                index,
                from: Status::Pending,
                to,
            })?;

        if !from.can_become(to) {
            return Err(CampaignError::InvalidTransition { index, from, to });
        }

        self.statuses[index] = to;
        Ok(())
    }

    /// Moves the cursor to `index` and marks it `Sending`.
    ///
    /// Only the lead right after the previous one may start, and only once
    /// the previous one has finished.
    pub(crate) fn begin(&mut self, index: usize) -> Result<(), CampaignError> {
        let previous_open = self
            .active_index
            .and_then(|i| self.statuses.get(i))
            .is_some_and(|s| !s.is_terminal());

        if index != self.cursor() || previous_open {
            return Err(CampaignError::InvalidTransition {
                index,
                from: self.statuses.get(index).copied().unwrap_or_default(),
                to: Status::Sending,
            });
        }

        self.transition(index, Status::Sending)?;
        self.active_index = Some(index);
        Ok(())
    }

    pub(crate) fn mark_sent(&mut self, index: usize, subject: String) -> Result<(), CampaignError> {
        self.transition(index, Status::Sent)?;
        self.subjects[index] = Some(subject);
        Ok(())
    }

    pub(crate) fn mark_failed(
        &mut self,
        index: usize,
        kind: FailureKind,
        reason: String,
        subject: Option<String>,
    ) -> Result<(), CampaignError> {
        self.transition(index, Status::Failed)?;
        self.subjects[index] = subject;
        self.failures[index] = Some(Failure { kind, reason });
        Ok(())
    }

    pub(crate) fn finish(&mut self) {
        self.cooldown_remaining = None;
        self.phase = Phase::Done;
    }
}
