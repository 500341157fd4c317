#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Playback core for the fullscreen story viewer: block segmentation, the
//! generation-tagged playback clock, navigation arithmetic and the viewer
//! state machine. Everything here is synchronous and free of I/O; the
//! `story-viewer` crate drives it on a tokio runtime.

pub mod blocks;
pub mod capture;
pub mod clock;
pub mod error;
pub mod events;
pub mod ids;
pub mod machine;
pub mod model;
pub mod navigation;

mod util;

pub use blocks::*;
pub use capture::*;
pub use clock::*;
pub use error::*;
pub use events::*;
pub use ids::*;
pub use machine::*;
pub use model::*;
pub use navigation::*;
pub use util::{new_ulid, now_ms, EpochMs};
