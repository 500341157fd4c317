//! Errors raised when opening a viewer.

use thiserror::Error;

/// Reasons a viewer session cannot be opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewerError {
    /// The feed handed over no stories.
    #[error("story list is empty")]
    EmptyStoryList,
    /// The requested starting story does not exist.
    #[error("initial index {index} is out of range for {len} stories")]
    InitialIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of stories supplied.
        len: usize,
    },
}
