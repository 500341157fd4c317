//! Fire-and-forget analytics writes.

use std::sync::Arc;

use story_core::{ActionType, StoryId, StoryStats, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use crate::store::ActionStore;

/// Aggregates read back after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRefresh {
    /// Story the counters belong to.
    pub story_id: StoryId,
    /// Totals after the write.
    pub stats: StoryStats,
}

/// Writes actions in background tasks so that playback never waits on the
/// store. Failures are logged and dropped.
#[derive(Clone)]
pub struct AnalyticsEmitter {
    store: Arc<dyn ActionStore>,
    actor_id: UserId,
    refreshed: mpsc::Sender<StatsRefresh>,
}

impl AnalyticsEmitter {
    /// Emitter writing as `actor_id`; refreshed totals go to `refreshed`.
    pub fn new(store: Arc<dyn ActionStore>, actor_id: UserId, refreshed: mpsc::Sender<StatsRefresh>) -> Self {
        Self {
            store,
            actor_id,
            refreshed,
        }
    }

    /// Records `action` and, when the write succeeds, publishes fresh
    /// aggregates. The returned handle is only useful to tests.
    pub fn record(&self, story_id: StoryId, action: ActionType) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let actor_id = self.actor_id.clone();
        let refreshed = self.refreshed.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record_action(&story_id, &actor_id, action).await {
                warn!(error = %e, story_id = %story_id, action = action.as_str(), "failed to record action");
                return;
            }
            debug!(story_id = %story_id, action = action.as_str(), "action recorded");

            match store.aggregate_counts(&story_id).await {
                Ok(stats) => {
                    // The viewer may be gone by now.
                    let _ = refreshed.send(StatsRefresh { story_id, stats }).await;
                }
                Err(e) => {
                    warn!(error = %e, story_id = %story_id, "failed to refresh story stats");
                }
            }
        }
        .in_current_span())
    }

    /// Counts a view.
    pub fn record_view(&self, story_id: StoryId) -> JoinHandle<()> {
        self.record(story_id, ActionType::View)
    }

    /// Counts a share.
    pub fn record_share(&self, story_id: StoryId) -> JoinHandle<()> {
        self.record(story_id, ActionType::Share)
    }

    /// Counts a capture intent.
    pub fn record_screenshot(&self, story_id: StoryId) -> JoinHandle<()> {
        self.record(story_id, ActionType::Screenshot)
    }
}
