//! The one live tick task.

use std::time::Duration;

use story_core::ClockToken;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Owns at most one periodic task that feeds [`ClockToken`] ticks to the
/// viewer. Starting always aborts the previous task first; ticks it already
/// queued carry an outdated token and are dropped by the state machine.
pub struct ClockDriver {
    ticks: mpsc::Sender<ClockToken>,
    task: Option<JoinHandle<()>>,
}

impl ClockDriver {
    /// Driver delivering ticks to `ticks`. Nothing runs until [`ClockDriver::start`].
    pub fn new(ticks: mpsc::Sender<ClockToken>) -> Self {
        Self { ticks, task: None }
    }

    /// Replaces the running task with one ticking `token` every `period`.
    /// The first tick arrives one period after the start.
    pub fn start(&mut self, token: ClockToken, period: Duration) {
        self.stop();
        let ticks = self.ticks.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                trace!(generation = token.generation(), "tick");
                if ticks.send(token).await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Aborts the running task, if any.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
