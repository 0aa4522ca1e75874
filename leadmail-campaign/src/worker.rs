use std::{future::Future, sync::Arc, time::Duration};

use leadmail_common::{Lead, ResultRecord, internal, tracing};
use leadmail_compose::Composer;
use leadmail_smtp::{OutboundMessage, Transport};
use leadmail_store::ResultsStore;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, Interval},
};
use tokio_util::sync::CancellationToken;

use crate::{
    CampaignConfig, CampaignError, CampaignRun, ProgressEvent, cooldown::Cooldown,
    status::FailureKind,
};

/// The collaborators a run drives each lead through.
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    pub composer: Arc<dyn Composer>,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn ResultsStore>,
}

/// How one lead's compose and send ended.
#[derive(Debug)]
enum Outcome {
    Sent {
        subject: String,
    },
    Failed {
        kind: FailureKind,
        reason: String,
        subject: Option<String>,
    },
}

/// Owns a [`CampaignRun`] and walks it to `Done`.
///
/// Every await races the run's cancellation token. Once cancelled the worker
/// stops without publishing again; `publish` also refuses to overwrite a
/// snapshot belonging to a newer run.
pub(crate) struct Worker {
    run: CampaignRun,
    pipeline: Pipeline,
    config: CampaignConfig,
    snapshot: watch::Sender<CampaignRun>,
    events: mpsc::UnboundedSender<ProgressEvent>,
    cancel: CancellationToken,
    clock: Interval,
}

impl Worker {
    pub(crate) fn new(
        run: CampaignRun,
        pipeline: Pipeline,
        config: CampaignConfig,
        snapshot: watch::Sender<CampaignRun>,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let second = Duration::from_secs(1);
        Self {
            run,
            pipeline,
            config,
            snapshot,
            events,
            cancel,
            clock: tokio::time::interval_at(Instant::now() + second, second),
        }
    }

    pub(crate) async fn run(mut self) -> Result<CampaignRun, CampaignError> {
        let total = self.run.leads.len();
        internal!(
            level = INFO,
            run = self.run.run_id,
            "Campaign started with {total} leads"
        );
        self.publish(Some(ProgressEvent::Started { total }));

        for index in 0..total {
            self.run.begin(index)?;
            self.publish(Some(ProgressEvent::Sending { index }));

            let lead = self.run.leads[index].clone();
            let handle = tokio::spawn(attempt(
                self.pipeline.clone(),
                index,
                lead.clone(),
                self.run.instruction.clone(),
                self.config.from_display_name.clone(),
            ));

            // Dropping the join handle on reset detaches the attempt, which
            // finishes its SMTP conversation on its own.
            let Some(joined) = self.until(handle).await else {
                tracing::warn!(
                    lead = index,
                    to = %lead.email,
                    "Run reset while sending; the message may still be delivered"
                );
                return Err(CampaignError::Reset);
            };

            let outcome = joined.unwrap_or_else(|e| Outcome::Failed {
                kind: FailureKind::Delivery,
                reason: format!("send task failed: {e}"),
                subject: None,
            });

            let event = self.record(index, &lead, outcome).await?;
            self.publish(Some(event));

            if index + 1 < total {
                self.cool_down().await?;
            }
        }

        self.run.finish();
        let (sent, failed) = (self.run.sent_count(), self.run.failed_count());
        internal!(
            level = INFO,
            run = self.run.run_id,
            elapsed_secs = self.run.elapsed_secs,
            "Campaign finished: {sent} sent, {failed} failed"
        );
        self.publish(Some(ProgressEvent::Finished { sent, failed }));

        Ok(self.run)
    }

    /// Drives `future` to completion, ticking the elapsed clock meanwhile.
    /// `None` if the run was cancelled first.
    async fn until<F: Future>(&mut self, future: F) -> Option<F::Output> {
        let cancel = self.cancel.clone();
        tokio::pin!(future);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return None,
                output = &mut future => return Some(output),
                _ = self.clock.tick() => {
                    self.run.elapsed_secs += 1;
                    self.publish(None);
                }
            }
        }
    }

    async fn cool_down(&mut self) -> Result<(), CampaignError> {
        let mut cooldown = Cooldown::start(self.config.cooldown_secs);
        internal!(
            "Cooling down for {}s before the next lead",
            cooldown.remaining()
        );
        self.run.cooldown_remaining = Some(cooldown.remaining());
        self.publish(Some(ProgressEvent::CooldownStarted {
            secs: cooldown.remaining(),
        }));

        while !cooldown.is_complete() {
            let remaining = self
                .until(cooldown.tick())
                .await
                .ok_or(CampaignError::Reset)?;
            self.run.cooldown_remaining = Some(remaining);
            self.publish(Some(ProgressEvent::CooldownTick { remaining }));
        }

        self.run.cooldown_remaining = None;
        self.publish(None);
        Ok(())
    }

    async fn record(
        &mut self,
        index: usize,
        lead: &Lead,
        outcome: Outcome,
    ) -> Result<ProgressEvent, CampaignError> {
        match outcome {
            Outcome::Sent { subject } => {
                self.run.mark_sent(index, subject.clone())?;

                if let Err(e) = self.pipeline.store.append(ResultRecord::sent(lead)).await {
                    tracing::error!(
                        lead = index,
                        to = %lead.email,
                        "Sent, but the result could not be stored: {e}"
                    );
                }

                Ok(ProgressEvent::Sent { index, subject })
            }
            Outcome::Failed {
                kind,
                reason,
                subject,
            } => {
                self.run
                    .mark_failed(index, kind, reason.clone(), subject.clone())?;
                Ok(ProgressEvent::Failed {
                    index,
                    kind,
                    reason,
                    subject,
                })
            }
        }
    }

    /// Copies the run into the shared snapshot and emits `event`, unless the
    /// snapshot now belongs to a different run.
    fn publish(&self, event: Option<ProgressEvent>) {
        let run_id = self.run.run_id;
        self.snapshot.send_if_modified(|current| {
            if current.run_id != run_id {
                return false;
            }

            current.clone_from(&self.run);
            if let Some(event) = event {
                // The caller may have stopped listening; the snapshot still updates.
                let _ = self.events.send(event);
            }
            true
        });
    }
}

async fn attempt(
    pipeline: Pipeline,
    index: usize,
    lead: Lead,
    instruction: String,
    from_display_name: Option<String>,
) -> Outcome {
    let message = match pipeline.composer.compose(&lead, &instruction).await {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(lead = index, to = %lead.email, "Compose failed: {e}");
            return Outcome::Failed {
                kind: FailureKind::Compose,
                reason: e.to_string(),
                subject: None,
            };
        }
    };

    let outbound = OutboundMessage {
        to: lead.email.clone(),
        subject: message.subject,
        body_text: message.text_body,
        body_html: message.html_body,
        from_display_name,
    };

    match pipeline.transport.send(&outbound).await {
        Ok(()) => {
            tracing::info!(lead = index, to = %lead.email, subject = %outbound.subject, "Sent");
            Outcome::Sent {
                subject: outbound.subject,
            }
        }
        Err(e) => {
            tracing::warn!(lead = index, to = %lead.email, "Delivery failed: {e}");
            Outcome::Failed {
                kind: FailureKind::Delivery,
                reason: e.to_string(),
                subject: Some(outbound.subject),
            }
        }
    }
}
