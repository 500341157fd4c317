use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use story_core::{now_ms, BlockPolicy, ContentType, HostEvent, StoryId, StoryItem, UserId, ViewerState};
use story_viewer::{InMemoryBackend, StoryViewer, ViewerConfig, ViewerDeps, ViewerHandle};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "storyctl", version, about = "Story playback engine driver")]
struct Args {
    /// Viewer settings (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter in env-filter syntax, e.g. `info,story_core=debug`.
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the block layout of every story.
    Segments {
        /// JSON array of stories.
        #[arg(long)]
        stories: PathBuf,
    },
    /// Play stories against the in-memory backend, printing host events.
    Play {
        #[arg(long)]
        stories: PathBuf,
        #[arg(long, default_value_t = 0)]
        initial_index: usize,
        #[arg(long, default_value = "storyctl")]
        actor_id: String,
        /// Simulated media load time.
        #[arg(long, default_value_t = 200)]
        load_delay_ms: u64,
    },
}

#[derive(Serialize)]
struct SegmentRow<'a> {
    story_id: &'a StoryId,
    content_type: ContentType,
    effective_ms: u64,
    blocks: Vec<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log)?;

    let config = match &args.config {
        Some(path) => ViewerConfig::load_from(path)?,
        None => ViewerConfig::default(),
    };

    match args.cmd {
        Cmd::Segments { stories } => {
            let stories = read_stories(&stories).await?;
            print_segments(&config.block_policy(), &stories)?;
        }
        Cmd::Play {
            stories,
            initial_index,
            actor_id,
            load_delay_ms,
        } => {
            let now = now_ms();
            let stories: Vec<StoryItem> = read_stories(&stories)
                .await?
                .into_iter()
                .filter(|s| s.is_live_at(now))
                .collect();
            if stories.is_empty() {
                bail!("no live stories to play");
            }
            play(
                &config,
                stories,
                initial_index,
                UserId::from_str(actor_id),
                Duration::from_millis(load_delay_ms),
            )
            .await?;
        }
    }
    Ok(())
}

fn init_tracing(filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter).context("invalid --log filter")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

async fn read_stories(path: &Path) -> anyhow::Result<Vec<StoryItem>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let stories = serde_json::from_slice(&bytes).context("parse stories json")?;
    Ok(stories)
}

fn print_segments(policy: &BlockPolicy, stories: &[StoryItem]) -> anyhow::Result<()> {
    for story in stories {
        let measured = story.is_video().then(|| policy.authored_ms(story));
        let Some(effective_ms) = policy.effective_duration_ms(story, measured) else {
            continue;
        };
        let row = SegmentRow {
            story_id: &story.id,
            content_type: story.content_type,
            effective_ms,
            blocks: policy.segments(effective_ms, story.is_video()),
        };
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

async fn play(
    config: &ViewerConfig,
    stories: Vec<StoryItem>,
    initial_index: usize,
    actor_id: UserId,
    load_delay: Duration,
) -> anyhow::Result<()> {
    let backend = Arc::new(InMemoryBackend::new());
    let deps = ViewerDeps {
        actions: backend.clone(),
        deleter: backend.clone(),
        capture: None,
    };
    let policy = config.block_policy();
    let opened = StoryViewer::open(config, stories.clone(), initial_index, actor_id, deps)
        .context("open viewer")?;
    info!(session = %opened.handle.session_id(), stories = stories.len(), "playing");

    let media = tokio::spawn(simulate_media(
        opened.handle.clone(),
        stories,
        policy,
        load_delay,
    ));

    let handle = opened.handle;
    let mut events = opened.events;
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                println!("{}", serde_json::to_string(&event)?);
                if event == HostEvent::Closed {
                    break;
                }
            }
            result = signal::ctrl_c(), if !interrupted => {
                result.context("listen for ctrl-c")?;
                interrupted = true;
                info!("interrupted, closing viewer");
                // Already closed if this fails.
                let _ = handle.close().await;
            }
        }
    }

    media.abort();
    opened.task.await.context("viewer task")?;
    info!(actions = backend.actions().len(), "viewer finished");
    Ok(())
}

/// Stands in for the media element: reports readiness `load_delay` after
/// each story starts loading. Videos report their authored length.
async fn simulate_media(
    handle: ViewerHandle,
    stories: Vec<StoryItem>,
    policy: BlockPolicy,
    load_delay: Duration,
) {
    let mut snapshots = handle.subscribe();
    let mut loading_index = None;
    loop {
        let loading = {
            let snapshot = snapshots.borrow_and_update();
            match snapshot.state {
                ViewerState::Loading => Some(snapshot.story_index),
                ViewerState::Closed => return,
                _ => None,
            }
        };
        if loading.is_some() && loading != loading_index {
            if let Some(index) = loading {
                let story = &stories[index];
                let measured = story.is_video().then(|| policy.authored_ms(story));
                let ready = handle.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(load_delay).await;
                    debug!(index, "media ready");
                    let _ = ready.media_ready(index, measured).await;
                });
            }
        }
        loading_index = loading;
        if snapshots.changed().await.is_err() {
            return;
        }
    }
}
