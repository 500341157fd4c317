//! Viewer settings loaded from TOML.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use story_core::{BlockPolicy, DEFAULT_STORY_SECONDS, DEFAULT_TICK_PERIOD_MS, VIDEO_BLOCK_MS};

/// Runtime settings of a viewer. Every key is optional in the TOML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Clock tick period.
    pub tick_period_ms: u64,
    /// Length of one video block.
    pub video_block_ms: u64,
    /// Duration used for stories without an authored one.
    pub default_image_seconds: u32,
    /// Capacity of the viewer's input queue.
    pub inbox_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            video_block_ms: VIDEO_BLOCK_MS,
            default_image_seconds: DEFAULT_STORY_SECONDS,
            inbox_capacity: 64,
        }
    }
}

impl ViewerConfig {
    /// Reads and parses a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: ViewerConfig = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Segmentation constants for the core.
    pub fn block_policy(&self) -> BlockPolicy {
        BlockPolicy {
            video_block_ms: self.video_block_ms,
            default_image_seconds: self.default_image_seconds,
        }
    }
}
