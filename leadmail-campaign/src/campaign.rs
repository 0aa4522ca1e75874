use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use leadmail_common::{Lead, ValidationError, internal};
use leadmail_compose::Composer;
use leadmail_smtp::Transport;
use leadmail_store::ResultsStore;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    CampaignConfig, CampaignError, CampaignRun, Phase, ProgressEvent,
    worker::{Pipeline, Worker},
};

/// The campaign controller: starts runs, resets them, and publishes their
/// state.
///
/// At most one run exists at a time. It is driven by a single background task
/// and observed through [`Campaign::subscribe`] (latest state) or the
/// [`RunHandle`] returned from [`Campaign::start_run`] (every event).
#[derive(Debug)]
pub struct Campaign {
    pipeline: Pipeline,
    config: CampaignConfig,
    snapshot: watch::Sender<CampaignRun>,
    active: Mutex<Option<CancellationToken>>,
    next_run_id: AtomicU64,
}

impl Campaign {
    #[must_use]
    pub fn new(
        composer: Arc<dyn Composer>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ResultsStore>,
        config: CampaignConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(CampaignRun::idle(0));
        Self {
            pipeline: Pipeline {
                composer,
                transport,
                store,
            },
            config,
            snapshot,
            active: Mutex::new(None),
            next_run_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// Starts sending to `leads`, in order, on a background task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NoLeads`] or [`ValidationError::BlankInstruction`];
    ///   the campaign stays in [`Phase::Input`]
    /// - [`CampaignError::NotIdle`] if a run exists; call [`Campaign::reset`]
    ///   first
    pub fn start_run(
        &self,
        leads: Vec<Lead>,
        instruction: &str,
    ) -> Result<RunHandle, CampaignError> {
        if leads.is_empty() {
            return Err(ValidationError::NoLeads.into());
        }
        if instruction.trim().is_empty() {
            return Err(ValidationError::BlankInstruction.into());
        }

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        let phase = self.snapshot.borrow().phase;
        if phase != Phase::Input {
            return Err(CampaignError::NotIdle(phase));
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let run = CampaignRun::start(run_id, leads, instruction.to_string(), &self.config);
        self.snapshot.send_replace(run.clone());

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let worker = Worker::new(
            run,
            self.pipeline.clone(),
            self.config.clone(),
            self.snapshot.clone(),
            events_tx,
            cancel.clone(),
        );

        let task = tokio::spawn(worker.run());
        *active = Some(cancel);

        Ok(RunHandle {
            run_id,
            events: events_rx,
            task,
        })
    }

    /// Discards the current run, if any, and returns to [`Phase::Input`].
    ///
    /// A send already in flight is not aborted and may still be delivered, but
    /// no further lead is attempted and nothing more is published for the
    /// discarded run.
    pub fn reset(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cancel) = active.take() {
            cancel.cancel();
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let previous = self.snapshot.send_replace(CampaignRun::idle(run_id));
        internal!(
            level = INFO,
            "Campaign reset from {} ({} of {} leads done)",
            previous.phase,
            previous.done_count(),
            previous.leads.len()
        );
    }

    /// The latest published state.
    #[must_use]
    pub fn snapshot(&self) -> CampaignRun {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CampaignRun> {
        self.snapshot.subscribe()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.snapshot.borrow().phase
    }

    /// Leads that failed in the current run, ready to be retried in a new one.
    #[must_use]
    pub fn failed_leads(&self) -> Vec<Lead> {
        self.snapshot.borrow().failed_leads()
    }
}

/// A started run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: u64,
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    task: JoinHandle<Result<CampaignRun, CampaignError>>,
}

impl RunHandle {
    #[must_use]
    pub const fn run_id(&self) -> u64 {
        self.run_id
    }

    /// The next progress event, or `None` once the run has finished or been
    /// reset.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Waits for the run to end and returns its final state.
    ///
    /// # Errors
    ///
    /// [`CampaignError::Reset`] if the run was discarded first.
    pub async fn wait(self) -> Result<CampaignRun, CampaignError> {
        self.task
            .await
            .map_err(|e| CampaignError::Worker(e.to_string()))?
    }
}
