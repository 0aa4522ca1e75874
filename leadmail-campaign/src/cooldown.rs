use std::time::Duration;

use tokio::time::Instant;

/// The pause between two sends, counted down a second at a time.
///
/// Ticks are measured from the start of the cooldown rather than from the
/// previous tick, so a slow observer cannot stretch it.
#[derive(Debug)]
pub struct Cooldown {
    started: Instant,
    total: u64,
    remaining: u64,
}

impl Cooldown {
    #[must_use]
    pub fn start(secs: u64) -> Self {
        Self {
            started: Instant::now(),
            total: secs,
            remaining: secs,
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Waits for the next one-second boundary and returns the seconds left.
    ///
    /// Cancel safe: dropping the future before it resolves leaves the
    /// countdown where it was.
    pub async fn tick(&mut self) -> u64 {
        if self.is_complete() {
            return 0;
        }

        let next = self.total - self.remaining + 1;
        tokio::time::sleep_until(self.started + Duration::from_secs(next)).await;
        self.remaining -= 1;
        self.remaining
    }
}
