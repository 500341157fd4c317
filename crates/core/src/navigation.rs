//! Next/previous position arithmetic.
//!
//! Block moves always win over story moves, so a multi-block story is never
//! skipped whole. The first block of the first story is an absorbing boundary.

use serde::{Deserialize, Serialize};

/// A (story, block) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Index into the story list.
    pub story_index: usize,
    /// Block within that story.
    pub block_index: u32,
}

impl Position {
    /// Shorthand constructor.
    pub const fn new(story_index: usize, block_index: u32) -> Self {
        Self {
            story_index,
            block_index,
        }
    }
}

/// Result of a forward advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// Next block of the same story; keeps playing without a reload.
    SameStory(Position),
    /// First block of the next story; media must load first.
    NextStory(Position),
    /// Past the last block of the last story.
    Close,
}

/// Result of a backward advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backward {
    /// Previous block of the same story.
    SameStory(Position),
    /// Last block of the previous story; media must load first.
    PreviousStory(Position),
    /// Already at the very first block.
    NoOp,
}

/// Where a forward advance from `pos` lands.
pub fn advance_forward<F>(pos: Position, story_count: usize, block_count_of: F) -> Forward
where
    F: Fn(usize) -> u32,
{
    let blocks = block_count_of(pos.story_index).max(1);
    if pos.block_index < blocks - 1 {
        return Forward::SameStory(Position::new(pos.story_index, pos.block_index + 1));
    }
    if pos.story_index < story_count.saturating_sub(1) {
        return Forward::NextStory(Position::new(pos.story_index + 1, 0));
    }
    Forward::Close
}

/// Where a backward advance from `pos` lands.
pub fn advance_backward<F>(pos: Position, block_count_of: F) -> Backward
where
    F: Fn(usize) -> u32,
{
    if pos.block_index > 0 {
        return Backward::SameStory(Position::new(pos.story_index, pos.block_index - 1));
    }
    if pos.story_index > 0 {
        let previous = pos.story_index - 1;
        let last_block = block_count_of(previous).max(1) - 1;
        return Backward::PreviousStory(Position::new(previous, last_block));
    }
    Backward::NoOp
}
