//! The viewer state machine.
//!
//! Functional core: [`ViewerMachine::handle`] applies one [`ViewerEvent`] to
//! the session and returns the [`Effect`]s the runtime has to carry out
//! (start/stop the tick task, persist analytics, delete, notify the host).
//! The machine never performs I/O and never waits on anything.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blocks::BlockPolicy;
use crate::clock::{ClockToken, PlaybackClock, TickOutcome};
use crate::error::ViewerError;
use crate::events::{HostEvent, ViewerEvent};
use crate::ids::{StoryId, UserId};
use crate::model::{ActionType, StoryItem};
use crate::navigation::{advance_backward, advance_forward, Backward, Forward, Position};

/// Coarse playback state, derived from the session flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerState {
    /// Waiting for the current story's media.
    Loading,
    /// Clock running.
    Playing,
    /// Stopped by the user, position kept.
    Paused,
    /// Terminal.
    Closed,
}

/// In-memory navigation state of one open viewer. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSession {
    /// Story under the cursor.
    pub current_story_index: usize,
    /// Block of that story.
    pub current_block_index: u32,
    /// Elapsed share of the current block, 0 to 100.
    pub progress_percent: f64,
    /// Set by the user; independent of loading.
    pub is_paused: bool,
    /// Waiting for the current story's media.
    pub is_loading: bool,
    /// Terminal flag.
    pub closed: bool,
}

impl ViewerSession {
    fn entering(story_index: usize) -> Self {
        Self {
            current_story_index: story_index,
            current_block_index: 0,
            progress_percent: 0.0,
            is_paused: false,
            is_loading: true,
            closed: false,
        }
    }

    /// Current (story, block) pair.
    pub fn position(&self) -> Position {
        Position::new(self.current_story_index, self.current_block_index)
    }

    /// Derived playback state.
    pub fn state(&self) -> ViewerState {
        if self.closed {
            ViewerState::Closed
        } else if self.is_loading {
            ViewerState::Loading
        } else if self.is_paused {
            ViewerState::Paused
        } else {
            ViewerState::Playing
        }
    }
}

/// Render-ready view of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSnapshot {
    /// Derived playback state.
    pub state: ViewerState,
    /// Current story.
    pub story_index: usize,
    /// Id of the current story.
    pub story_id: StoryId,
    /// Current block.
    pub block_index: u32,
    /// Segments in the progress bar.
    pub block_count: u32,
    /// Known once the current story's media is ready.
    pub block_duration_ms: Option<u64>,
    /// Fill of the current segment.
    pub progress_percent: f64,
}

/// Work the runtime must do on behalf of the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace any running tick task with one for `token`.
    StartClock {
        /// Generation the new task must tick with.
        token: ClockToken,
        /// Tick period.
        period_ms: u64,
    },
    /// Cancel the running tick task.
    StopClock,
    /// Persist one analytics action, fire-and-forget.
    RecordAction {
        /// Story the action is counted against.
        story_id: StoryId,
        /// What happened.
        action: ActionType,
    },
    /// Ask the deletion collaborator to remove a story.
    DeleteStory {
        /// Story to remove.
        story_id: StoryId,
    },
    /// Forward to the host.
    Notify(HostEvent),
}

/// Session orchestrator: owns the session, the clock and the measured
/// durations of stories seen so far.
#[derive(Debug, Clone)]
pub struct ViewerMachine {
    stories: Vec<StoryItem>,
    actor_id: UserId,
    policy: BlockPolicy,
    session: ViewerSession,
    clock: PlaybackClock,
    /// Clock generation the runtime was last told about.
    announced: Option<ClockToken>,
    measured_ms: Vec<Option<u64>>,
    deleting: Option<StoryId>,
}

impl ViewerMachine {
    /// Opens a session on `stories[initial_index]`.
    ///
    /// Returns the machine together with the entry effects of the first
    /// story (its view record).
    pub fn open(
        stories: Vec<StoryItem>,
        initial_index: usize,
        actor_id: UserId,
        policy: BlockPolicy,
        tick_period_ms: u64,
    ) -> Result<(Self, Vec<Effect>), ViewerError> {
        if stories.is_empty() {
            return Err(ViewerError::EmptyStoryList);
        }
        if initial_index >= stories.len() {
            return Err(ViewerError::InitialIndexOutOfRange {
                index: initial_index,
                len: stories.len(),
            });
        }

        let measured_ms = vec![None; stories.len()];
        let mut machine = Self {
            stories,
            actor_id,
            policy,
            session: ViewerSession::entering(initial_index),
            clock: PlaybackClock::new(tick_period_ms),
            announced: None,
            measured_ms,
            deleting: None,
        };
        info!(
            stories = machine.stories.len(),
            initial_index, "viewer session opened"
        );

        let mut effects = Vec::new();
        machine.enter_story(initial_index, 0, &mut effects);
        machine.sync_clock(&mut effects);
        Ok((machine, effects))
    }

    /// Current session state.
    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    /// Derived playback state.
    pub fn state(&self) -> ViewerState {
        self.session.state()
    }

    /// Whether the viewer reached its terminal state.
    pub fn is_closed(&self) -> bool {
        self.session.closed
    }

    /// Stories this session plays.
    pub fn stories(&self) -> &[StoryItem] {
        &self.stories
    }

    /// The story under the cursor.
    pub fn current_story(&self) -> &StoryItem {
        &self.stories[self.session.current_story_index]
    }

    /// User the session records actions for.
    pub fn actor_id(&self) -> &UserId {
        &self.actor_id
    }

    /// Block count of story `index`: the measured length once this session
    /// has seen the video, the authored length before that.
    pub fn block_count_of(&self, index: usize) -> u32 {
        let story = &self.stories[index];
        let ms = self
            .policy
            .effective_duration_ms(story, self.measured_ms[index])
            .unwrap_or_else(|| self.policy.authored_ms(story));
        self.policy.block_count(ms, story.is_video())
    }

    /// Duration of the current block, once the media is ready.
    pub fn current_block_ms(&self) -> Option<u64> {
        let index = self.session.current_story_index;
        let story = &self.stories[index];
        self.policy
            .effective_duration_ms(story, self.measured_ms[index])
            .map(|ms| {
                self.policy
                    .block_duration_ms(ms, story.is_video(), self.session.current_block_index)
            })
    }

    /// Render-ready snapshot.
    pub fn snapshot(&self) -> ViewerSnapshot {
        let index = self.session.current_story_index;
        ViewerSnapshot {
            state: self.state(),
            story_index: index,
            story_id: self.stories[index].id.clone(),
            block_index: self.session.current_block_index,
            block_count: self.block_count_of(index),
            block_duration_ms: if self.session.is_loading {
                None
            } else {
                self.current_block_ms()
            },
            progress_percent: self.session.progress_percent,
        }
    }

    /// Applies one event. A closed machine ignores everything.
    pub fn handle(&mut self, event: ViewerEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.session.closed {
            debug!(?event, "event after close ignored");
            return effects;
        }

        match event {
            ViewerEvent::Tick(token) => self.on_tick(token, &mut effects),
            ViewerEvent::MediaReady {
                story_index,
                measured_duration_ms,
            } => self.on_media_ready(story_index, measured_duration_ms, &mut effects),
            ViewerEvent::Next => self.go_forward(true, &mut effects),
            ViewerEvent::Prev => self.go_backward(&mut effects),
            ViewerEvent::Pause => self.session.is_paused = true,
            ViewerEvent::Resume => self.session.is_paused = false,
            ViewerEvent::Close => self.close(&mut effects),
            ViewerEvent::Share => self.record_current(ActionType::Share, &mut effects),
            ViewerEvent::CaptureIntent => self.record_current(ActionType::Screenshot, &mut effects),
            ViewerEvent::Delete => self.request_delete(&mut effects),
            ViewerEvent::DeleteFinished { story_id, result } => {
                self.on_delete_finished(story_id, result, &mut effects)
            }
            ViewerEvent::OpenCreation => {
                effects.push(Effect::Notify(HostEvent::OpenStoryCreation));
                self.close(&mut effects);
            }
        }

        self.sync_clock(&mut effects);
        effects
    }

    fn on_tick(&mut self, token: ClockToken, effects: &mut Vec<Effect>) {
        match self.clock.tick(token) {
            TickOutcome::Stale => {
                debug!(generation = token.generation(), "stale tick dropped");
            }
            TickOutcome::Progress(percent) => self.session.progress_percent = percent,
            TickOutcome::Complete => {
                self.session.progress_percent = 100.0;
                self.go_forward(false, effects);
            }
        }
    }

    fn on_media_ready(&mut self, story_index: usize, measured_ms: Option<u64>, effects: &mut Vec<Effect>) {
        if story_index != self.session.current_story_index || !self.session.is_loading {
            debug!(story_index, "media ready for a story not awaiting it");
            return;
        }

        let story = &self.stories[story_index];
        if story.is_video() {
            let ms = match measured_ms {
                Some(ms) => ms,
                None => {
                    warn!(story_id = %story.id, "video ready without a measured duration; using authored duration");
                    self.policy.authored_ms(story)
                }
            };
            self.measured_ms[story_index] = Some(ms);
        }

        let last_block = self.block_count_of(story_index) - 1;
        self.session.current_block_index = self.session.current_block_index.min(last_block);
        self.session.is_loading = false;
        debug!(
            story_index,
            block_index = self.session.current_block_index,
            blocks = last_block + 1,
            "media ready"
        );
        self.arm_current_block();
        if self.session.current_block_index > 0 {
            self.seek_current_block(effects);
        }
    }

    /// `gesture` is false when the clock finished the block; the media is
    /// then already at the next block's offset and needs no seek.
    fn go_forward(&mut self, gesture: bool, effects: &mut Vec<Effect>) {
        let step = advance_forward(self.session.position(), self.stories.len(), |i| {
            self.block_count_of(i)
        });
        debug!(?step, from = ?self.session.position(), "advance forward");
        match step {
            Forward::SameStory(pos) => {
                self.session.current_block_index = pos.block_index;
                self.arm_current_block();
                if gesture {
                    self.seek_current_block(effects);
                }
            }
            Forward::NextStory(pos) => self.enter_story(pos.story_index, pos.block_index, effects),
            Forward::Close => self.close(effects),
        }
    }

    fn go_backward(&mut self, effects: &mut Vec<Effect>) {
        let step = advance_backward(self.session.position(), |i| self.block_count_of(i));
        debug!(?step, from = ?self.session.position(), "advance backward");
        match step {
            Backward::SameStory(pos) => {
                self.session.current_block_index = pos.block_index;
                self.arm_current_block();
                self.seek_current_block(effects);
            }
            Backward::PreviousStory(pos) => self.enter_story(pos.story_index, pos.block_index, effects),
            Backward::NoOp => {}
        }
    }

    /// Entry action of a story: reset progress, wait for media, count a view.
    /// Views are counted on every entry, including returns to a story
    /// already seen in this session.
    fn enter_story(&mut self, story_index: usize, block_index: u32, effects: &mut Vec<Effect>) {
        self.clock.stop();
        self.session.current_story_index = story_index;
        self.session.current_block_index = block_index;
        self.session.progress_percent = 0.0;
        self.session.is_loading = true;

        let story = &self.stories[story_index];
        if !story.is_consistent() {
            warn!(story_id = %story.id, content_type = ?story.content_type, "story media fields disagree with its content type");
        }
        effects.push(Effect::RecordAction {
            story_id: story.id.clone(),
            action: ActionType::View,
        });
    }

    /// Progress goes back to zero before the next clock generation starts.
    fn arm_current_block(&mut self) {
        self.session.progress_percent = 0.0;
        let block_ms = self.current_block_ms().unwrap_or(1);
        self.clock.arm(block_ms);
    }

    fn seek_current_block(&self, effects: &mut Vec<Effect>) {
        let story = self.current_story();
        if story.is_video() && !self.session.is_loading {
            effects.push(Effect::Notify(HostEvent::SeekMedia {
                story_id: story.id.clone(),
                offset_ms: self.policy.block_offset_ms(self.session.current_block_index),
            }));
        }
    }

    fn record_current(&self, action: ActionType, effects: &mut Vec<Effect>) {
        effects.push(Effect::RecordAction {
            story_id: self.current_story().id.clone(),
            action,
        });
    }

    fn request_delete(&mut self, effects: &mut Vec<Effect>) {
        let story = self.current_story();
        if story.creator_id != self.actor_id {
            warn!(story_id = %story.id, actor = %self.actor_id, "delete refused: not the creator");
            effects.push(Effect::Notify(HostEvent::DeletionFailed {
                story_id: story.id.clone(),
                reason: "only the creator can delete this story".into(),
            }));
            return;
        }
        if let Some(pending) = &self.deleting {
            debug!(story_id = %pending, "delete already in flight");
            return;
        }
        let story_id = story.id.clone();
        self.deleting = Some(story_id.clone());
        effects.push(Effect::DeleteStory { story_id });
    }

    fn on_delete_finished(&mut self, story_id: StoryId, result: Result<(), String>, effects: &mut Vec<Effect>) {
        if self.deleting.as_ref() != Some(&story_id) {
            debug!(story_id = %story_id, "deletion result for no pending request");
            return;
        }
        self.deleting = None;
        match result {
            Ok(()) => {
                info!(story_id = %story_id, "story deleted");
                effects.push(Effect::Notify(HostEvent::StoryDeleted { story_id }));
                self.close(effects);
            }
            Err(reason) => {
                warn!(story_id = %story_id, %reason, "story deletion failed");
                effects.push(Effect::Notify(HostEvent::DeletionFailed { story_id, reason }));
            }
        }
    }

    fn close(&mut self, effects: &mut Vec<Effect>) {
        self.clock.stop();
        self.session.closed = true;
        info!(position = ?self.session.position(), "viewer closed");
        effects.push(Effect::Notify(HostEvent::Closed));
    }

    /// Runs the clock exactly when the session is neither paused, loading
    /// nor closed, and tells the runtime whenever the live generation changes.
    fn sync_clock(&mut self, effects: &mut Vec<Effect>) {
        let should_run = !self.session.closed && !self.session.is_paused && !self.session.is_loading;
        match (should_run, self.clock.live_token()) {
            (true, None) => {
                self.clock.start();
            }
            (false, Some(_)) => self.clock.stop(),
            _ => {}
        }

        let live = self.clock.live_token();
        if live == self.announced {
            return;
        }
        self.announced = live;
        effects.push(match live {
            Some(token) => Effect::StartClock {
                token,
                period_ms: self.clock.period_ms(),
            },
            None => Effect::StopClock,
        });
    }
}
