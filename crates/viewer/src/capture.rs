//! Capture-intent detection.
//!
//! A detector is attached while a viewer is open and detached when it
//! closes. It only ever reports *intent*; nothing here can observe an
//! actual screenshot.

use story_core::{is_capture_combo, KeyChord, ViewerEvent};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where a detector reports capture intents.
#[derive(Clone)]
pub struct CaptureSink(mpsc::Sender<ViewerEvent>);

impl CaptureSink {
    /// Sink feeding `events`.
    pub fn new(events: mpsc::Sender<ViewerEvent>) -> Self {
        Self(events)
    }

    /// Reports one intent. Returns false once the viewer is gone.
    pub fn notify(&self) -> bool {
        match self.0.try_send(ViewerEvent::CaptureIntent) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("viewer queue full, capture intent dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Keeps a detector attached. Dropping it detaches.
#[must_use = "the detector detaches when the guard is dropped"]
pub struct CaptureGuard {
    task: Option<JoinHandle<()>>,
}

impl CaptureGuard {
    /// Guard around a forwarding task.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Source of best-effort capture signals.
pub trait CaptureIntentDetector: Send + Sync {
    /// Starts reporting into `sink` until the returned guard is dropped.
    fn attach(&self, sink: CaptureSink) -> CaptureGuard;
}

/// Watches key presses published by the host's keyboard hook for the usual
/// screenshot shortcuts.
pub struct KeyboardCaptureDetector {
    keys: broadcast::Sender<KeyChord>,
}

impl KeyboardCaptureDetector {
    /// Detector buffering up to `capacity` key presses per listener.
    pub fn new(capacity: usize) -> Self {
        let (keys, _) = broadcast::channel(capacity.max(1));
        Self { keys }
    }

    /// Publishes one key press. Presses with no attached viewer are lost.
    pub fn publish(&self, chord: KeyChord) {
        let _ = self.keys.send(chord);
    }

    /// Whether any viewer is currently listening.
    pub fn is_attached(&self) -> bool {
        self.keys.receiver_count() > 0
    }
}

impl CaptureIntentDetector for KeyboardCaptureDetector {
    fn attach(&self, sink: CaptureSink) -> CaptureGuard {
        let mut keys = self.keys.subscribe();
        CaptureGuard::new(tokio::spawn(async move {
            loop {
                match keys.recv().await {
                    Ok(chord) => {
                        if !is_capture_combo(&chord) {
                            continue;
                        }
                        debug!(key = %chord.key, "capture shortcut pressed");
                        if !sink.notify() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "key events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}
