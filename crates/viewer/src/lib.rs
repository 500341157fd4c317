#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Tokio runtime for the story viewer: one actor task per open viewer owns a
//! [`story_core::ViewerMachine`] and carries out its effects (the tick task,
//! analytics writes, deletions, host notifications).

pub mod analytics;
pub mod capture;
pub mod clock;
pub mod config;
pub mod store;
pub mod viewer;

pub use analytics::{AnalyticsEmitter, StatsRefresh};
pub use capture::{CaptureGuard, CaptureIntentDetector, CaptureSink, KeyboardCaptureDetector};
pub use clock::ClockDriver;
pub use config::ViewerConfig;
pub use store::{ActionRecord, ActionStore, InMemoryBackend, StoreError, StoryDeleter};
pub use viewer::{OpenViewer, StoryViewer, ViewerClosed, ViewerDeps, ViewerHandle};
