//! Scripted collaborators for driving a campaign under a paused clock.

#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use leadmail_campaign::{Campaign, CampaignConfig, ProgressEvent, RunHandle};
use leadmail_common::{Lead, ResultRecord};
use leadmail_compose::{ComposeError, ComposedMessage, Composer};
use leadmail_smtp::{DeliveryError, OutboundMessage, PermanentError, Transport};
use leadmail_store::{MemoryResultsStore, ResultsStore, StoreError};
use tokio::time::Instant;

pub fn leads(n: usize) -> Vec<Lead> {
    (0..n)
        .map(|i| {
            Lead::new(
                format!("Lead {i}"),
                format!("lead{i}@example.com"),
                format!("Company {i}"),
            )
        })
        .collect()
}

/// Subjects are `Hello <name>`. Fails with a rate limit `rate_limited` times
/// before its first success, and always fails for addresses in `failing`.
#[derive(Debug, Default)]
pub struct ScriptedComposer {
    rate_limited: usize,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate_limited_first(times: usize) -> Self {
        Self {
            rate_limited: times,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_for(mut self, email: &str) -> Self {
        self.failing.insert(email.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Composer for ScriptedComposer {
    async fn compose(
        &self,
        lead: &Lead,
        instruction: &str,
    ) -> Result<ComposedMessage, ComposeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.rate_limited {
            return Err(ComposeError::RateLimited { retry_after_ms: 0 });
        }
        if self.failing.contains(&lead.email) {
            return Err(ComposeError::Malformed("no subject in draft".to_string()));
        }

        Ok(ComposedMessage {
            subject: format!("Hello {}", lead.name),
            text_body: format!("Hi {},\n\n{instruction}", lead.name),
            html_body: None,
        })
    }
}

/// Records every send with the time it started. Each send takes `latency`;
/// recipients in `rejecting` get a permanent failure.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    latency: Duration,
    rejecting: HashSet<String>,
    sent: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn rejecting(mut self, email: &str) -> Self {
        self.rejecting.insert(email.to_string());
        self
    }

    pub fn attempts(&self) -> Vec<(Instant, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.attempts().into_iter().map(|(_, to)| to).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), message.to.clone()));
        tokio::time::sleep(self.latency).await;

        if self.rejecting.contains(&message.to) {
            return Err(PermanentError::MessageRejected("550 No such user".to_string()).into());
        }
        Ok(())
    }
}

/// A store whose writes always fail.
#[derive(Debug, Default)]
pub struct BrokenStore;

#[async_trait]
impl ResultsStore for BrokenStore {
    async fn append(&self, _record: ResultRecord) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn list(&self) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn toggle_replied(&self, id: &str) -> Result<ResultRecord, StoreError> {
        Err(StoreError::NotFound(id.to_string()))
    }

    async fn mark_replied(&self, _emails: &HashSet<String>) -> Result<usize, StoreError> {
        Ok(0)
    }
}

pub fn scripted() -> Arc<dyn Composer> {
    Arc::new(ScriptedComposer::new())
}

/// Drains a run's event stream.
pub async fn events(handle: &mut RunHandle) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    events
}

pub fn config(cooldown_secs: u64) -> CampaignConfig {
    CampaignConfig {
        cooldown_secs,
        ..CampaignConfig::default()
    }
}

pub struct Harness {
    pub campaign: Campaign,
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryResultsStore>,
}

pub fn harness(
    composer: Arc<dyn Composer>,
    transport: ScriptedTransport,
    config: CampaignConfig,
) -> Harness {
    let transport = Arc::new(transport);
    let store = Arc::new(MemoryResultsStore::new());

    let campaign = Campaign::new(
        composer,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&store) as Arc<dyn ResultsStore>,
        config,
    );

    Harness {
        campaign,
        transport,
        store,
    }
}

pub fn cooldowns(events: &[ProgressEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::CooldownStarted { .. }))
        .count()
}
