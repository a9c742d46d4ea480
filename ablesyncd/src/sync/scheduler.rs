use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::SyncError;

/// Runs a unit of work every `interval` until cancelled. Each cycle is
/// awaited before the next tick, so cycles of one scheduler never overlap.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    name: &'static str,
    interval: Duration,
}

impl Scheduler {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self { name, interval }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn run<F, Fut>(self, cancel: CancellationToken, mut work: F)
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), SyncError>>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(scheduler = self.name, interval_ms = self.interval.as_millis() as u64, "scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match work(cancel.clone()).await {
                Ok(()) => {}
                Err(SyncError::Cancelled) => debug!(scheduler = self.name, "cycle cancelled"),
                Err(err) => error!(scheduler = self.name, error = %err, "cycle failed"),
            }
        }

        info!(scheduler = self.name, "scheduler stopped");
    }
}
