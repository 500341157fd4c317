//! Persistence collaborators: analytics writes and story deletion.

mod memory;

pub use memory::{ActionRecord, InMemoryBackend};

use async_trait::async_trait;
use story_core::{ActionType, StoryId, StoryStats, UserId};
use thiserror::Error;

/// Failures reported by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend down or refusing writes.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// No such story, or it is already gone.
    #[error("story not found: {0}")]
    NotFound(StoryId),
}

/// Records analytics actions and serves their aggregates.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Persists one action by `actor_id` against `story_id`.
    async fn record_action(
        &self,
        story_id: &StoryId,
        actor_id: &UserId,
        action: ActionType,
    ) -> Result<(), StoreError>;

    /// Current view/share/screenshot totals for `story_id`.
    async fn aggregate_counts(&self, story_id: &StoryId) -> Result<StoryStats, StoreError>;
}

/// Removes stories on behalf of their owner.
#[async_trait]
pub trait StoryDeleter: Send + Sync {
    /// Deletes `story_id` on behalf of `actor_id`.
    async fn delete_story(&self, story_id: &StoryId, actor_id: &UserId) -> Result<(), StoreError>;
}
