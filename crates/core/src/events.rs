//! Viewer input events and host notifications.

use serde::{Deserialize, Serialize};

use crate::clock::ClockToken;
use crate::ids::StoryId;
use crate::model::StoryStats;

/// Everything that can happen to an open viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Periodic tick from the clock generation named by the token.
    Tick(ClockToken),
    /// The media element for `story_index` can play. Videos report their
    /// measured length when the element knows it.
    MediaReady {
        /// Story whose media became ready.
        story_index: usize,
        /// Real length of a video, when known.
        measured_duration_ms: Option<u64>,
    },
    /// Forward gesture (tap zone or arrow).
    Next,
    /// Backward gesture.
    Prev,
    /// Press-and-hold started.
    Pause,
    /// Press-and-hold released.
    Resume,
    /// Explicit close.
    Close,
    /// User shared the current story.
    Share,
    /// The capture-intent detector fired. Best-effort, not a reliable
    /// screenshot signal.
    CaptureIntent,
    /// Owner asked to delete the current story.
    Delete,
    /// The deletion collaborator answered.
    DeleteFinished {
        /// Story the request was for.
        story_id: StoryId,
        /// Failure reason on error.
        result: Result<(), String>,
    },
    /// Viewer gives way to the story upload flow.
    OpenCreation,
}

/// Notifications for the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// An owner-initiated deletion completed.
    StoryDeleted {
        /// The removed story.
        story_id: StoryId,
    },
    /// A deletion was refused or failed; the viewer stays open.
    DeletionFailed {
        /// Story the request was for.
        story_id: StoryId,
        /// Human-readable cause.
        reason: String,
    },
    /// The host should start the story creation flow.
    OpenStoryCreation,
    /// Aggregate counters after a recorded action.
    StatsRefreshed {
        /// Story the counters belong to.
        story_id: StoryId,
        /// Current totals.
        stats: StoryStats,
    },
    /// The media element should jump to `offset_ms` (block move within a video).
    SeekMedia {
        /// Video to reposition.
        story_id: StoryId,
        /// Start of the target block.
        offset_ms: u64,
    },
    /// The viewer closed; no further events follow.
    Closed,
}
