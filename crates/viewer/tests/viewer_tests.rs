//! End-to-end tests of the viewer actor on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use story_core::{
    ActionType, ContentType, CreatorInfo, HostEvent, KeyChord, StoryId, StoryItem, UserId,
    ViewerError, ViewerSnapshot, ViewerState,
};
use story_viewer::{
    CaptureIntentDetector, InMemoryBackend, KeyboardCaptureDetector, OpenViewer, StoryViewer,
    ViewerClosed, ViewerConfig, ViewerDeps, ViewerHandle,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout, Instant};

const VIEWER: &str = "viewer";

fn story(id: &str, content_type: ContentType, seconds: u32, creator: &str) -> StoryItem {
    let (media_url, video_url) = match content_type {
        ContentType::Image => (Some(format!("https://cdn.example/{id}.jpg")), None),
        ContentType::Video => (None, Some(format!("https://cdn.example/{id}.mp4"))),
    };
    StoryItem {
        id: StoryId::from_str(id),
        creator_id: UserId::from_str(creator),
        media_url,
        video_url,
        content_type,
        duration_seconds: seconds,
        created_at_ms: 0,
        expires_at_ms: i64::MAX,
        is_active: true,
        creator: CreatorInfo {
            display_name: creator.into(),
            avatar_url: None,
        },
    }
}

fn image(id: &str, seconds: u32) -> StoryItem {
    story(id, ContentType::Image, seconds, "creator")
}

fn open_with(
    stories: Vec<StoryItem>,
    backend: &Arc<InMemoryBackend>,
    capture: Option<Arc<dyn CaptureIntentDetector>>,
) -> OpenViewer {
    let deps = ViewerDeps {
        actions: backend.clone(),
        deleter: backend.clone(),
        capture,
    };
    StoryViewer::open(
        &ViewerConfig::default(),
        stories,
        0,
        UserId::from_str(VIEWER),
        deps,
    )
    .unwrap()
}

async fn wait_for(handle: &ViewerHandle, pred: impl Fn(&ViewerSnapshot) -> bool) -> ViewerSnapshot {
    let mut rx = handle.subscribe();
    timeout(Duration::from_secs(120), async move {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if pred(&*snapshot) {
                    return (*snapshot).clone();
                }
            }
            rx.changed().await.expect("viewer dropped its snapshot");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

/// Next host event other than a stats refresh.
async fn next_event(events: &mut UnboundedReceiver<HostEvent>) -> HostEvent {
    loop {
        let event = timeout(Duration::from_secs(120), events.recv())
            .await
            .expect("timed out waiting for host event")
            .expect("host events ended");
        if !matches!(event, HostEvent::StatsRefreshed { .. }) {
            return event;
        }
    }
}

async fn wait_detached(detector: &KeyboardCaptureDetector) {
    for _ in 0..10 {
        if !detector.is_attached() {
            return;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn image_story_advances_after_its_duration() {
    let backend = Arc::new(InMemoryBackend::new());
    let opened = open_with(vec![image("a", 1), image("b", 1)], &backend, None);
    assert_eq!(opened.handle.snapshot().state, ViewerState::Loading);

    let started = Instant::now();
    opened.handle.media_ready(0, None).await.unwrap();
    let playing = wait_for(&opened.handle, |s| s.state == ViewerState::Playing).await;
    assert_eq!(playing.block_duration_ms, Some(1_000));

    let next = wait_for(&opened.handle, |s| s.story_index == 1).await;
    assert!(started.elapsed() >= Duration::from_millis(1_000));
    assert_eq!(next.state, ViewerState::Loading);
    assert_eq!(next.progress_percent, 0.0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn next_resets_progress_and_counts_a_view() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut opened = open_with(vec![image("a", 10), image("b", 10)], &backend, None);

    opened.handle.media_ready(0, None).await.unwrap();
    wait_for(&opened.handle, |s| s.progress_percent > 0.0).await;
    opened.handle.next().await.unwrap();
    let snapshot = wait_for(&opened.handle, |s| s.story_index == 1).await;
    assert_eq!(snapshot.progress_percent, 0.0);
    assert_eq!(snapshot.state, ViewerState::Loading);

    opened.handle.close().await.unwrap();
    assert_eq!(next_event(&mut opened.events).await, HostEvent::Closed);
    opened.task.await.unwrap();
    // Fire-and-forget writes may still be in flight.
    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.count(&StoryId::from_str("a"), ActionType::View), 1);
    assert_eq!(backend.count(&StoryId::from_str("b"), ActionType::View), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn pause_holds_position_until_resume() {
    let backend = Arc::new(InMemoryBackend::new());
    let opened = open_with(vec![image("a", 1), image("b", 1)], &backend, None);

    opened.handle.media_ready(0, None).await.unwrap();
    wait_for(&opened.handle, |s| s.progress_percent >= 50.0).await;
    opened.handle.pause().await.unwrap();
    let held = wait_for(&opened.handle, |s| s.state == ViewerState::Paused).await;

    sleep(Duration::from_secs(5)).await;
    let still = opened.handle.snapshot();
    assert_eq!(still.state, ViewerState::Paused);
    assert_eq!(still.story_index, 0);
    assert_eq!(still.progress_percent, held.progress_percent);

    opened.handle.resume().await.unwrap();
    wait_for(&opened.handle, |s| s.story_index == 1).await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn video_blocks_seek_the_media() {
    let backend = Arc::new(InMemoryBackend::new());
    let clip = story("clip", ContentType::Video, 10, "creator");
    let mut opened = open_with(vec![clip], &backend, None);

    opened.handle.media_ready(0, Some(65_000)).await.unwrap();
    let playing = wait_for(&opened.handle, |s| s.state == ViewerState::Playing).await;
    assert_eq!(playing.block_count, 3);

    opened.handle.next().await.unwrap();
    assert_eq!(
        next_event(&mut opened.events).await,
        HostEvent::SeekMedia {
            story_id: StoryId::from_str("clip"),
            offset_ms: 30_000
        }
    );
    let second = wait_for(&opened.handle, |s| s.block_index == 1).await;
    assert_eq!(second.block_duration_ms, Some(30_000));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn close_stops_the_viewer() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut opened = open_with(vec![image("a", 10)], &backend, None);
    opened.handle.media_ready(0, None).await.unwrap();

    opened.handle.close().await.unwrap();
    assert_eq!(next_event(&mut opened.events).await, HostEvent::Closed);
    opened.task.await.unwrap();

    assert_eq!(opened.handle.snapshot().state, ViewerState::Closed);
    assert_eq!(opened.handle.next().await, Err(ViewerClosed));
    assert!(opened.events.recv().await.is_none());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dropping_every_handle_closes_the_viewer() {
    let backend = Arc::new(InMemoryBackend::new());
    let OpenViewer {
        handle,
        mut events,
        task,
    } = open_with(vec![image("a", 10)], &backend, None);

    drop(handle);
    assert_eq!(next_event(&mut events).await, HostEvent::Closed);
    task.await.unwrap();
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failing_analytics_never_block_playback() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.set_fail_actions(true);
    let mut opened = open_with(vec![image("a", 1), image("b", 1)], &backend, None);

    opened.handle.media_ready(0, None).await.unwrap();
    opened.handle.share().await.unwrap();
    wait_for(&opened.handle, |s| s.story_index == 1).await;

    opened.handle.close().await.unwrap();
    opened.task.await.unwrap();
    let mut seen = Vec::new();
    while let Some(event) = opened.events.recv().await {
        seen.push(event);
    }
    assert_eq!(seen, vec![HostEvent::Closed]);
    assert!(backend.actions().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn share_publishes_refreshed_stats() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut opened = open_with(vec![image("a", 10)], &backend, None);
    opened.handle.share().await.unwrap();

    let stats = timeout(Duration::from_secs(5), async {
        loop {
            match opened.events.recv().await {
                Some(HostEvent::StatsRefreshed { stats, .. }) if stats.shares == 1 => return stats,
                Some(_) => continue,
                None => panic!("host events ended"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(stats.views, 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn owner_delete_removes_story_and_closes() {
    let backend = Arc::new(InMemoryBackend::new());
    let own = story("mine", ContentType::Image, 10, VIEWER);
    let mut opened = open_with(vec![own], &backend, None);

    opened.handle.delete().await.unwrap();
    assert_eq!(
        next_event(&mut opened.events).await,
        HostEvent::StoryDeleted {
            story_id: StoryId::from_str("mine")
        }
    );
    assert_eq!(next_event(&mut opened.events).await, HostEvent::Closed);
    opened.task.await.unwrap();
    assert!(backend.is_deleted(&StoryId::from_str("mine")));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_delete_keeps_viewer_open() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.set_fail_deletes(true);
    let own = story("mine", ContentType::Image, 10, VIEWER);
    let mut opened = open_with(vec![own], &backend, None);

    opened.handle.delete().await.unwrap();
    match next_event(&mut opened.events).await {
        HostEvent::DeletionFailed { story_id, reason } => {
            assert_eq!(story_id, StoryId::from_str("mine"));
            assert!(reason.contains("unavailable"), "{reason}");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_ne!(opened.handle.snapshot().state, ViewerState::Closed);
    assert!(!backend.is_deleted(&StoryId::from_str("mine")));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn non_owner_cannot_delete() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut opened = open_with(vec![image("theirs", 10)], &backend, None);

    opened.handle.delete().await.unwrap();
    assert!(matches!(
        next_event(&mut opened.events).await,
        HostEvent::DeletionFailed { .. }
    ));
    assert!(!backend.is_deleted(&StoryId::from_str("theirs")));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn open_creation_hands_over_and_closes() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut opened = open_with(vec![image("a", 10)], &backend, None);

    opened.handle.open_creation().await.unwrap();
    assert_eq!(next_event(&mut opened.events).await, HostEvent::OpenStoryCreation);
    assert_eq!(next_event(&mut opened.events).await, HostEvent::Closed);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn capture_shortcut_records_a_screenshot() {
    let backend = Arc::new(InMemoryBackend::new());
    let detector = Arc::new(KeyboardCaptureDetector::new(16));
    let capture: Arc<dyn CaptureIntentDetector> = detector.clone();
    let mut opened = open_with(vec![image("a", 10)], &backend, Some(capture));
    assert!(detector.is_attached());

    detector.publish(KeyChord::plain("x"));
    detector.publish(KeyChord::meta_shift("4"));
    let stats = timeout(Duration::from_secs(5), async {
        loop {
            match opened.events.recv().await {
                Some(HostEvent::StatsRefreshed { stats, .. }) if stats.screenshots == 1 => {
                    return stats
                }
                Some(_) => continue,
                None => panic!("host events ended"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(stats.views, 1);

    opened.handle.close().await.unwrap();
    opened.task.await.unwrap();
    wait_detached(&detector).await;
    assert!(!detector.is_attached());
}

#[tokio::test]
async fn empty_story_list_is_rejected() {
    let backend = Arc::new(InMemoryBackend::new());
    let deps = ViewerDeps {
        actions: backend.clone(),
        deleter: backend,
        capture: None,
    };
    let result = StoryViewer::open(
        &ViewerConfig::default(),
        Vec::new(),
        0,
        UserId::from_str(VIEWER),
        deps,
    );
    assert!(matches!(result, Err(ViewerError::EmptyStoryList)));
}
