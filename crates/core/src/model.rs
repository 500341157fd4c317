//! Stories and the analytics counted against them.

use serde::{Deserialize, Serialize};

use crate::ids::{StoryId, UserId};
use crate::util::EpochMs;

/// Authored duration assumed when a story row carries none.
pub const DEFAULT_STORY_SECONDS: u32 = 10;

/// What kind of media a story carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Still image, shown for its authored duration.
    Image,
    /// Video, segmented into blocks once its real length is known.
    Video,
}

/// Display info about the story's creator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatorInfo {
    /// Name shown in the viewer header.
    pub display_name: String,
    /// Avatar image, if the creator set one.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A story as supplied by the feed. Read-only to the viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryItem {
    /// Feed identifier.
    pub id: StoryId,
    /// Author; the only user allowed to delete the story.
    pub creator_id: UserId,
    /// Populated for images.
    #[serde(default)]
    pub media_url: Option<String>,
    /// Populated for videos.
    #[serde(default)]
    pub video_url: Option<String>,
    /// Decides which media URL is used and whether the story is segmented.
    pub content_type: ContentType,
    /// Authored duration in seconds. Zero is treated as unset.
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u32,
    /// Upload time.
    pub created_at_ms: EpochMs,
    /// After this instant the story is no longer live.
    pub expires_at_ms: EpochMs,
    /// Cleared when the story was taken down early.
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    /// Denormalised creator profile.
    pub creator: CreatorInfo,
}

fn default_duration_seconds() -> u32 {
    DEFAULT_STORY_SECONDS
}

fn default_is_active() -> bool {
    true
}

impl StoryItem {
    /// True for video stories.
    pub fn is_video(&self) -> bool {
        self.content_type == ContentType::Video
    }

    /// URL the media collaborator should load for this story.
    pub fn media_source(&self) -> Option<&str> {
        match self.content_type {
            ContentType::Image => self.media_url.as_deref(),
            ContentType::Video => self.video_url.as_deref(),
        }
    }

    /// Whether `content_type` agrees with which URL field is populated.
    pub fn is_consistent(&self) -> bool {
        match self.content_type {
            ContentType::Image => self.media_url.is_some() && self.video_url.is_none(),
            ContentType::Video => self.video_url.is_some() && self.media_url.is_none(),
        }
    }

    /// Active and not yet expired at `now_ms`.
    pub fn is_live_at(&self, now_ms: EpochMs) -> bool {
        self.is_active && self.expires_at_ms > now_ms
    }
}

/// Analytics action recorded against a story.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Story entered.
    View,
    /// User shared the story.
    Share,
    /// Capture shortcut seen while the story was on screen.
    Screenshot,
}

impl ActionType {
    /// Wire name, as stored by the persistence collaborator.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::View => "view",
            ActionType::Share => "share",
            ActionType::Screenshot => "screenshot",
        }
    }
}

/// Aggregated action counts for one story.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryStats {
    /// Recorded views.
    pub views: u64,
    /// Recorded shares.
    pub shares: u64,
    /// Recorded capture intents.
    pub screenshots: u64,
}

impl StoryStats {
    /// Counts one more `action`.
    pub fn bump(&mut self, action: ActionType) {
        match action {
            ActionType::View => self.views += 1,
            ActionType::Share => self.shares += 1,
            ActionType::Screenshot => self.screenshots += 1,
        }
    }
}
