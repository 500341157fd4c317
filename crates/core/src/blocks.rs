//! Block segmentation: how long a story plays and how its progress bar is split.
//!
//! Images always have a single block covering their authored duration. Videos
//! are cut into fixed-length blocks once their real playback length is known;
//! the last block covers whatever remains.

use serde::{Deserialize, Serialize};

use crate::model::{StoryItem, DEFAULT_STORY_SECONDS};

/// Length of one video block.
pub const VIDEO_BLOCK_MS: u64 = 30_000;

/// Segmentation constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPolicy {
    /// Length of a full video block in milliseconds.
    pub video_block_ms: u64,
    /// Duration used for stories whose authored duration is zero.
    pub default_image_seconds: u32,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            video_block_ms: VIDEO_BLOCK_MS,
            default_image_seconds: DEFAULT_STORY_SECONDS,
        }
    }
}

impl BlockPolicy {
    /// Authored duration in milliseconds, with zero treated as unset.
    pub fn authored_ms(&self, story: &StoryItem) -> u64 {
        let seconds = match story.duration_seconds {
            0 => self.default_image_seconds,
            s => s,
        };
        u64::from(seconds) * 1_000
    }

    /// Playback length of `story`.
    ///
    /// Videos only have one once the media element has measured it; `None`
    /// means the story has not loaded yet in this session.
    pub fn effective_duration_ms(&self, story: &StoryItem, measured_video_ms: Option<u64>) -> Option<u64> {
        if story.is_video() {
            measured_video_ms
        } else {
            Some(self.authored_ms(story))
        }
    }

    /// Number of progress blocks. Never below one.
    pub fn block_count(&self, effective_ms: u64, is_video: bool) -> u32 {
        if !is_video {
            return 1;
        }
        let blocks = effective_ms.div_ceil(self.video_block_ms.max(1)).max(1);
        u32::try_from(blocks).unwrap_or(u32::MAX)
    }

    /// Duration of block `block_index`. Never below one millisecond.
    pub fn block_duration_ms(&self, effective_ms: u64, is_video: bool, block_index: u32) -> u64 {
        if !is_video {
            return effective_ms.max(1);
        }
        let remaining = effective_ms.saturating_sub(self.block_offset_ms(block_index));
        remaining.min(self.video_block_ms.max(1)).max(1)
    }

    /// Media offset at which block `block_index` starts.
    pub fn block_offset_ms(&self, block_index: u32) -> u64 {
        u64::from(block_index) * self.video_block_ms
    }

    /// Every block's duration, in order.
    pub fn segments(&self, effective_ms: u64, is_video: bool) -> Vec<u64> {
        (0..self.block_count(effective_ms, is_video))
            .map(|i| self.block_duration_ms(effective_ms, is_video, i))
            .collect()
    }
}

/// [`BlockPolicy::effective_duration_ms`] with the default policy.
pub fn compute_effective_duration_ms(story: &StoryItem, measured_video_ms: Option<u64>) -> Option<u64> {
    BlockPolicy::default().effective_duration_ms(story, measured_video_ms)
}

/// [`BlockPolicy::block_count`] with the default policy.
pub fn compute_block_count(effective_ms: u64, is_video: bool) -> u32 {
    BlockPolicy::default().block_count(effective_ms, is_video)
}
