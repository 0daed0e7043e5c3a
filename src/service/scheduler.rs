//! # Publish Scheduler
//!
//! Repeating timer that pulls the latest position fix on each tick and
//! forwards it into the service loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::fix::{FixSource, PositionFix};

/// Owns the repeating publish timer of a session
///
/// Ticks never overlap: a single task awaits each tick's work, and a tick
/// that comes due while the previous one is still in progress is deferred.
pub struct PublishScheduler {
    task: Option<JoinHandle<()>>,
}

impl PublishScheduler {
    pub fn new() -> Self {
        Self { task: None }
    }

    /// Whether the timer task is currently armed
    pub fn is_running(&self) -> bool {
        match &self.task {
            Some(task) => !task.is_finished(),
            None => false,
        }
    }

    /// Begin firing immediately and then every `interval`
    ///
    /// Each tick fetches the latest sample from `source`; no sample yet is
    /// silently skipped, not an error. A running scheduler is replaced.
    pub fn start(
        &mut self,
        interval: Duration,
        source: Arc<dyn FixSource>,
        sink: mpsc::UnboundedSender<PositionFix>,
    ) {
        self.stop();

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match source.latest_fix() {
                    Some(fix) => {
                        if sink.send(fix).is_err() {
                            // Service loop gone; nothing left to publish to
                            return;
                        }
                    }
                    None => debug!("no position fix available yet, skipping tick"),
                }
            }
        }));
    }

    /// Cancel the repeating timer; idempotent if already stopped
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Default for PublishScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PublishScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
