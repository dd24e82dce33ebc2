use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use cove_feed::{FeedStatus, MessageFeed, PendingQueue, TypingTracker};
use cove_types::models::{FeedTarget, Message};

use crate::plan::{PlanInput, TimelineEntry, build_plan};
use crate::scroll::{SavedView, ScrollAnchor, ScrollCmd, Viewport};

/// Pagination batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy)]
pub struct TimelineConfig {
    pub batch_size: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE }
    }
}

/// Host-side occurrences the synchronizer reacts to.
#[derive(Debug, Clone)]
pub enum TimelineEvent {
    /// The feed's change counter ticked
    FeedChanged,
    /// The pending-send queue changed
    PendingChanged,
    /// The pagination sentinel scrolled into view
    SentinelVisible,
    /// The viewer moved the scrollbar
    Scrolled(f32),
    /// The scroll container was resized
    ViewportResized(f32),
    /// The content element's rendered height changed
    ContentResized(f32),
    /// A paint frame completed
    FrameRendered,
    /// The viewer clicked the new-messages affordance
    JumpToBottom,
    /// Search results replaced (or cleared) the feed view
    SearchResults(Option<Vec<Message>>),
    /// The host observed a page request failing
    PageLoadFailed,
    /// The viewer clicked the retry affordance
    RetryLoad,
}

/// Merges the paginated history, live arrivals, and the optimistic tail into
/// one scroll-stable view of a single target.
///
/// Event in, commands out: the host forwards view occurrences to
/// [`Timeline::update`] and applies the returned scroll commands after the
/// paint they belong to. Pagination is issued directly against the feed,
/// guarded so concurrent sentinel triggers collapse into one request.
pub struct Timeline {
    target: FeedTarget,
    feed: Arc<dyn MessageFeed>,
    pending: PendingQueue,
    config: TimelineConfig,
    anchor: ScrollAnchor,
    search: Option<Vec<Message>>,
    load_in_flight: bool,
    load_failed: bool,
    last_count: usize,
    last_pending: usize,
    saved: HashMap<FeedTarget, SavedView>,
    typing: Option<Arc<TypingTracker>>,
}

impl Timeline {
    pub fn new(
        target: FeedTarget,
        feed: Arc<dyn MessageFeed>,
        pending: PendingQueue,
        config: TimelineConfig,
    ) -> Self {
        let last_count = feed.page().len();
        let last_pending = pending.len();
        Self {
            target,
            feed,
            pending,
            config,
            anchor: ScrollAnchor::new(),
            search: None,
            load_in_flight: false,
            load_failed: false,
            last_count,
            last_pending,
            saved: HashMap::new(),
            typing: None,
        }
    }

    /// Attach the workspace typing tracker so the footer can show who is
    /// typing in the current target.
    pub fn set_typing_tracker(&mut self, tracker: Arc<TypingTracker>) {
        self.typing = Some(tracker);
    }

    /// Usernames currently typing in this target.
    pub fn typing(&self) -> Vec<String> {
        self.typing.as_ref().map(|t| t.active(self.target)).unwrap_or_default()
    }

    pub fn target(&self) -> FeedTarget {
        self.target
    }

    pub fn viewport(&self) -> Viewport {
        self.anchor.viewport()
    }

    pub fn new_messages_visible(&self) -> bool {
        self.anchor.new_messages_visible()
    }

    pub fn is_loading_more(&self) -> bool {
        self.load_in_flight
    }

    /// Current render plan.
    pub fn plan(&self) -> Vec<TimelineEntry> {
        let page = self.feed.page();
        let pending = self.pending.snapshot();
        build_plan(PlanInput {
            page: &page,
            pending: &pending,
            search: self.search.as_deref(),
            batch_size: self.config.batch_size,
            load_failed: self.load_failed,
        })
    }

    pub fn update(&mut self, event: TimelineEvent) -> Vec<ScrollCmd> {
        let mut cmds = Vec::new();
        match event {
            TimelineEvent::FeedChanged => {
                let page = self.feed.page();
                let count = page.len();
                let grew = count > self.last_count;

                // A load that was in flight has resolved once the status has
                // left LoadingMore. Count growth while still loading is a
                // live arrival landing mid-pagination.
                let resolved = self.load_in_flight && page.status != FeedStatus::LoadingMore;
                if resolved {
                    self.load_in_flight = false;
                    self.load_failed = false;
                    if grew {
                        self.anchor.note_prepend_expected();
                    }
                    debug!(count, status = ?page.status, "older page resolved");
                }

                let live_growth = grew && !resolved;
                self.pending.reconcile(&page, live_growth);
                if live_growth {
                    self.anchor.note_live_growth();
                }
                self.last_count = count;
            }
            TimelineEvent::PendingChanged => {
                let count = self.pending.len();
                // A fresh local send pins the view to the newest message.
                if count > self.last_pending {
                    cmds.push(self.anchor.jump_to_bottom());
                }
                self.last_pending = count;
            }
            TimelineEvent::SentinelVisible => {
                let status = self.feed.page().status;
                if !self.load_in_flight && !self.load_failed && status == FeedStatus::CanLoadMore {
                    self.load_in_flight = true;
                    trace!(batch = self.config.batch_size, "sentinel visible, requesting page");
                    self.feed.load_more(self.config.batch_size);
                }
            }
            TimelineEvent::Scrolled(top) => self.anchor.on_scrolled(top),
            TimelineEvent::ViewportResized(height) => self.anchor.set_viewport_height(height),
            TimelineEvent::ContentResized(height) => {
                cmds.extend(self.anchor.on_content_resized(height));
            }
            TimelineEvent::FrameRendered => cmds.extend(self.anchor.on_frame()),
            TimelineEvent::JumpToBottom => cmds.push(self.anchor.jump_to_bottom()),
            TimelineEvent::SearchResults(results) => self.search = results,
            TimelineEvent::PageLoadFailed => {
                self.load_in_flight = false;
                self.load_failed = true;
            }
            TimelineEvent::RetryLoad => {
                if self.load_failed {
                    self.load_failed = false;
                    if self.feed.page().status == FeedStatus::CanLoadMore {
                        self.load_in_flight = true;
                        self.feed.load_more(self.config.batch_size);
                    }
                }
            }
        }
        cmds
    }

    /// Switch to another target, saving the current scroll placement and
    /// restoring the new target's if it was visited before.
    pub fn switch_target(
        &mut self,
        target: FeedTarget,
        feed: Arc<dyn MessageFeed>,
        pending: PendingQueue,
    ) -> Vec<ScrollCmd> {
        self.saved.insert(self.target, self.anchor.save());

        self.target = target;
        self.feed = feed;
        self.pending = pending;
        self.search = None;
        self.load_in_flight = false;
        self.load_failed = false;
        self.last_count = self.feed.page().len();
        self.last_pending = self.pending.len();

        match self.saved.get(&target).copied() {
            Some(saved) => {
                self.anchor.restore(saved);
                vec![ScrollCmd::ScrollTo(saved.scroll_top)]
            }
            None => {
                self.anchor = ScrollAnchor::new();
                vec![self.anchor.jump_to_bottom()]
            }
        }
    }
}
