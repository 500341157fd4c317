use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use story_core::{now_ms, ActionType, EpochMs, StoryId, StoryStats, UserId};

use super::{ActionStore, StoreError, StoryDeleter};

/// One persisted action row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    /// Story the action targets.
    pub story_id: StoryId,
    /// Who acted.
    pub actor_id: UserId,
    /// What happened.
    pub action: ActionType,
    /// Write time.
    pub recorded_at_ms: EpochMs,
}

/// In-memory backend for tests and the CLI. Not durable.
///
/// Failures can be switched on to exercise the best-effort paths.
#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    actions: Vec<ActionRecord>,
    deleted: HashSet<StoryId>,
    fail_actions: bool,
    fail_deletes: bool,
}

impl InMemoryBackend {
    /// Empty backend with failures off.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every action write and aggregate read fail.
    pub fn set_fail_actions(&self, fail: bool) {
        self.lock().fail_actions = fail;
    }

    /// Makes every deletion fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// All recorded actions, oldest first.
    pub fn actions(&self) -> Vec<ActionRecord> {
        self.lock().actions.clone()
    }

    /// How many `action`s were recorded for `story_id`.
    pub fn count(&self, story_id: &StoryId, action: ActionType) -> usize {
        self.lock()
            .actions
            .iter()
            .filter(|r| &r.story_id == story_id && r.action == action)
            .count()
    }

    /// Whether `story_id` was deleted.
    pub fn is_deleted(&self, story_id: &StoryId) -> bool {
        self.lock().deleted.contains(story_id)
    }
}

#[async_trait]
impl ActionStore for InMemoryBackend {
    async fn record_action(
        &self,
        story_id: &StoryId,
        actor_id: &UserId,
        action: ActionType,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_actions {
            return Err(StoreError::Unavailable("action writes disabled".into()));
        }
        inner.actions.push(ActionRecord {
            story_id: story_id.clone(),
            actor_id: actor_id.clone(),
            action,
            recorded_at_ms: now_ms(),
        });
        Ok(())
    }

    async fn aggregate_counts(&self, story_id: &StoryId) -> Result<StoryStats, StoreError> {
        let inner = self.lock();
        if inner.fail_actions {
            return Err(StoreError::Unavailable("aggregate reads disabled".into()));
        }
        let mut stats = StoryStats::default();
        for record in inner.actions.iter().filter(|r| &r.story_id == story_id) {
            stats.bump(record.action);
        }
        Ok(stats)
    }
}

#[async_trait]
impl StoryDeleter for InMemoryBackend {
    async fn delete_story(&self, story_id: &StoryId, _actor_id: &UserId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_deletes {
            return Err(StoreError::Unavailable("deletes disabled".into()));
        }
        if !inner.deleted.insert(story_id.clone()) {
            return Err(StoreError::NotFound(story_id.clone()));
        }
        Ok(())
    }
}
