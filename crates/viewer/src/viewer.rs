//! One actor task per open viewer.
//!
//! The actor owns the [`ViewerMachine`], the tick task and the capture
//! guard. Input arrives over a bounded queue from [`ViewerHandle`]s, output
//! goes to the host as [`HostEvent`]s and as a watched [`ViewerSnapshot`].

use std::sync::Arc;
use std::time::Duration;

use story_core::{
    new_ulid, ClockToken, Effect, HostEvent, StoryId, StoryItem, UserId, ViewerError, ViewerEvent,
    ViewerMachine, ViewerSnapshot,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use ulid::Ulid;

use crate::analytics::{AnalyticsEmitter, StatsRefresh};
use crate::capture::{CaptureGuard, CaptureIntentDetector, CaptureSink};
use crate::clock::ClockDriver;
use crate::config::ViewerConfig;
use crate::store::{ActionStore, StoryDeleter};

/// Collaborators of an open viewer.
#[derive(Clone)]
pub struct ViewerDeps {
    /// Analytics persistence.
    pub actions: Arc<dyn ActionStore>,
    /// Owner deletion.
    pub deleter: Arc<dyn StoryDeleter>,
    /// Attached for the lifetime of the viewer when present.
    pub capture: Option<Arc<dyn CaptureIntentDetector>>,
}

/// The viewer task has finished.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("viewer is closed")]
pub struct ViewerClosed;

/// Cheap, cloneable input side of an open viewer. When the last handle is
/// dropped the viewer closes.
#[derive(Clone)]
pub struct ViewerHandle {
    inbox: mpsc::Sender<ViewerEvent>,
    snapshot: watch::Receiver<ViewerSnapshot>,
    session_id: Ulid,
}

impl ViewerHandle {
    /// Id of this viewer session, also the `session` field of its tracing span.
    pub fn session_id(&self) -> Ulid {
        self.session_id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ViewerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<ViewerSnapshot> {
        self.snapshot.clone()
    }

    /// Whether the viewer task has stopped accepting input.
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    /// Queues a raw event.
    pub async fn send(&self, event: ViewerEvent) -> Result<(), ViewerClosed> {
        self.inbox.send(event).await.map_err(|_| ViewerClosed)
    }

    /// Forward gesture.
    pub async fn next(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::Next).await
    }

    /// Backward gesture.
    pub async fn prev(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::Prev).await
    }

    /// Press-and-hold started.
    pub async fn pause(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::Pause).await
    }

    /// Press-and-hold released.
    pub async fn resume(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::Resume).await
    }

    /// Closes the viewer.
    pub async fn close(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::Close).await
    }

    /// Records a share of the current story.
    pub async fn share(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::Share).await
    }

    /// Asks to delete the current story. Only its creator may.
    pub async fn delete(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::Delete).await
    }

    /// Hands over to the story creation flow and closes.
    pub async fn open_creation(&self) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::OpenCreation).await
    }

    /// Media element of `story_index` can play.
    pub async fn media_ready(
        &self,
        story_index: usize,
        measured_duration_ms: Option<u64>,
    ) -> Result<(), ViewerClosed> {
        self.send(ViewerEvent::MediaReady {
            story_index,
            measured_duration_ms,
        })
        .await
    }
}

/// A freshly opened viewer.
pub struct OpenViewer {
    /// Input side.
    pub handle: ViewerHandle,
    /// Host notifications. Ends after [`HostEvent::Closed`].
    pub events: mpsc::UnboundedReceiver<HostEvent>,
    /// The actor task; finishes once the viewer closed.
    pub task: JoinHandle<()>,
}

/// Entry point for opening viewers.
pub struct StoryViewer;

impl StoryViewer {
    /// Opens a viewer on `stories[initial_index]` and spawns its actor.
    /// Must be called from within a tokio runtime.
    pub fn open(
        config: &ViewerConfig,
        stories: Vec<StoryItem>,
        initial_index: usize,
        actor_id: UserId,
        deps: ViewerDeps,
    ) -> Result<OpenViewer, ViewerError> {
        let session_id = new_ulid();
        let span = info_span!("viewer", session = %session_id);

        let (machine, initial) = {
            let _enter = span.enter();
            ViewerMachine::open(
                stories,
                initial_index,
                actor_id.clone(),
                config.block_policy(),
                config.tick_period_ms.max(1),
            )?
        };

        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (internal_tx, internal_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (tick_tx, tick_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (stats_tx, stats_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());

        // The detector reports on the internal queue so that it never keeps
        // the viewer alive after the last handle is gone.
        let capture = deps
            .capture
            .as_ref()
            .map(|detector| detector.attach(CaptureSink::new(internal_tx.clone())));

        let actor = ViewerActor {
            machine,
            clock: ClockDriver::new(tick_tx),
            analytics: AnalyticsEmitter::new(deps.actions, actor_id.clone(), stats_tx),
            deleter: deps.deleter,
            actor_id,
            internal: internal_tx,
            host: host_tx,
            snapshot: snapshot_tx,
            capture,
        };
        let task = tokio::spawn(
            actor
                .run(initial, inbox_rx, internal_rx, tick_rx, stats_rx)
                .instrument(span),
        );

        Ok(OpenViewer {
            handle: ViewerHandle {
                inbox: inbox_tx,
                snapshot: snapshot_rx,
                session_id,
            },
            events: host_rx,
            task,
        })
    }
}

struct ViewerActor {
    machine: ViewerMachine,
    clock: ClockDriver,
    analytics: AnalyticsEmitter,
    deleter: Arc<dyn StoryDeleter>,
    actor_id: UserId,
    internal: mpsc::Sender<ViewerEvent>,
    host: mpsc::UnboundedSender<HostEvent>,
    snapshot: watch::Sender<ViewerSnapshot>,
    capture: Option<CaptureGuard>,
}

impl ViewerActor {
    async fn run(
        mut self,
        initial: Vec<Effect>,
        mut inbox: mpsc::Receiver<ViewerEvent>,
        mut internal: mpsc::Receiver<ViewerEvent>,
        mut ticks: mpsc::Receiver<ClockToken>,
        mut stats: mpsc::Receiver<StatsRefresh>,
    ) {
        self.apply(initial);
        self.publish();

        while !self.machine.is_closed() {
            let event = tokio::select! {
                received = inbox.recv() => match received {
                    Some(event) => event,
                    None => {
                        debug!("all handles dropped");
                        ViewerEvent::Close
                    }
                },
                Some(event) = internal.recv() => event,
                Some(token) = ticks.recv() => ViewerEvent::Tick(token),
                Some(refresh) = stats.recv() => {
                    let _ = self.host.send(HostEvent::StatsRefreshed {
                        story_id: refresh.story_id,
                        stats: refresh.stats,
                    });
                    continue;
                }
            };

            let effects = self.machine.handle(event);
            self.apply(effects);
            self.publish();
        }

        self.clock.stop();
        self.capture.take();
        info!("viewer task finished");
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartClock { token, period_ms } => {
                    self.clock.start(token, Duration::from_millis(period_ms));
                }
                Effect::StopClock => self.clock.stop(),
                Effect::RecordAction { story_id, action } => {
                    self.analytics.record(story_id, action);
                }
                Effect::DeleteStory { story_id } => self.spawn_delete(story_id),
                Effect::Notify(event) => {
                    let _ = self.host.send(event);
                }
            }
        }
    }

    fn spawn_delete(&self, story_id: StoryId) {
        let deleter = Arc::clone(&self.deleter);
        let actor_id = self.actor_id.clone();
        let internal = self.internal.clone();
        tokio::spawn(async move {
            let result = deleter
                .delete_story(&story_id, &actor_id)
                .await
                .map_err(|e| {
                    warn!(error = %e, story_id = %story_id, "delete request failed");
                    e.to_string()
                });
            let _ = internal
                .send(ViewerEvent::DeleteFinished { story_id, result })
                .await;
        }
        .in_current_span());
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.machine.snapshot());
    }
}
