mod fixtures;
mod transport;

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use cove_composer::{Composer, EnterOutcome};
use cove_feed::{LocalFeed, PendingQueue, TypingTracker, UserDirectory};
use cove_timeline::{Timeline, TimelineConfig, TimelineEntry, TimelineEvent};
use cove_types::models::{ChannelId, FeedTarget};

use crate::transport::{LoopbackTransport, StaticRoster};

/// Scripted session over a loopback backend: mounts a seeded channel,
/// paginates upward, receives a live arrival while scrolled away, then runs
/// a full optimistic send round trip.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cove=debug".into()),
        )
        .init();

    // Config
    let page_size: u32 = std::env::var("COVE_PAGE_SIZE")
        .unwrap_or_else(|_| "50".into())
        .parse()?;
    let latency_ms: u64 = std::env::var("COVE_SEND_LATENCY_MS")
        .unwrap_or_else(|_| "25".into())
        .parse()?;

    // Workspace roster and directory
    let roster = Arc::new(StaticRoster::default_crew());
    let profiles = roster.profiles();
    let viewer = profiles[0].clone();
    let directory = Arc::new(UserDirectory::new(roster));
    directory.prime(profiles.clone());

    // A channel with a few days of traffic
    let target = FeedTarget::Channel(ChannelId(Uuid::new_v4()));
    let feed = LocalFeed::new(target);
    feed.seed(fixtures::history(target, &profiles, 180), page_size);

    let pending = PendingQueue::new();
    let mut timeline = Timeline::new(
        target,
        Arc::new(feed.clone()),
        pending.clone(),
        TimelineConfig { batch_size: page_size },
    );
    let transport = Arc::new(LoopbackTransport::new(feed.clone(), viewer.clone(), latency_ms));
    let mut composer = Composer::new(target, viewer, directory, pending.clone(), transport);

    // Mount: the view opens pinned to the newest message.
    timeline.update(TimelineEvent::ViewportResized(600.0));
    timeline.update(TimelineEvent::ContentResized(2400.0));
    describe("mounted", &timeline.plan());

    // Scroll to the top and trigger the sentinel twice.
    timeline.update(TimelineEvent::Scrolled(0.0));
    for _ in 0..2 {
        timeline.update(TimelineEvent::SentinelVisible);
        timeline.update(TimelineEvent::FeedChanged);
        // Page renders above the viewport, the frame callback compensates.
        timeline.update(TimelineEvent::ContentResized(
            timeline.viewport().content_height + 1800.0,
        ));
        let cmds = timeline.update(TimelineEvent::FrameRendered);
        info!(?cmds, "older page merged");
    }
    describe("paginated", &timeline.plan());

    // Typing indication routed from the push layer.
    let typing = Arc::new(TypingTracker::new());
    timeline.set_typing_tracker(typing.clone());
    typing.observe(target, profiles[2].id, profiles[2].username.clone());
    info!(typing = ?timeline.typing(), "typing footer");

    // A live arrival while scrolled away surfaces the affordance.
    feed.post(
        profiles[1].clone(),
        "heads up: rotating the staging keys".into(),
        Vec::new(),
        None,
        None,
    );
    timeline.update(TimelineEvent::FeedChanged);
    info!(affordance = timeline.new_messages_visible(), "live arrival while scrolled up");
    let cmds = timeline.update(TimelineEvent::JumpToBottom);
    info!(?cmds, "jumped to bottom");

    // Optimistic send with an attachment.
    composer.set_body("shipping the release notes now");
    composer.attach("notes.png", "image/png", Bytes::from_static(b"fake image bytes"));
    match composer.on_enter(false) {
        EnterOutcome::Submitted(key) => info!(?key, "send queued"),
        other => anyhow::bail!("submit did not queue: {other:?}"),
    }
    timeline.update(TimelineEvent::PendingChanged);
    describe("optimistic tail visible", &timeline.plan());

    composer.flush().await;
    timeline.update(TimelineEvent::FeedChanged);
    describe("send confirmed", &timeline.plan());
    info!(pending = pending.len(), previews = composer.previews().live_count(), "settled");

    Ok(())
}

fn describe(stage: &str, plan: &[TimelineEntry]) {
    let messages = plan.iter().filter(|e| matches!(e, TimelineEntry::Msg { .. })).count();
    let compact = plan
        .iter()
        .filter(|e| matches!(e, TimelineEntry::Msg { compact: true, .. }))
        .count();
    let separators = plan.iter().filter(|e| matches!(e, TimelineEntry::DateSeparator(_))).count();
    let pending = plan.iter().filter(|e| matches!(e, TimelineEntry::Pending(_))).count();
    info!(stage, messages, compact, separators, pending, "timeline");
}
