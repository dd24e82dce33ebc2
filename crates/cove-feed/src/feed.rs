use std::sync::Arc;

use tokio::sync::watch;

use cove_types::models::Message;

/// Loading state of a paginated feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// First page has not arrived yet
    LoadingFirstPage,
    /// At least one page is loaded and older pages exist
    CanLoadMore,
    /// An older page was requested and has not resolved yet
    LoadingMore,
    /// The full history is loaded
    Exhausted,
}

/// Snapshot of a feed: the currently-loaded results in descending recency
/// order (newest first), plus the loading state.
///
/// Results are behind an `Arc` so consumers share the delivered pages
/// instead of copying them, and cannot mutate them in place.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub results: Arc<[Message]>,
    pub status: FeedStatus,
}

impl FeedPage {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A reactive paginated message feed for one target.
///
/// The surface is deliberately synchronous: `load_more` only *requests* the
/// next older page. New results always arrive through push invalidation,
/// observed via `changes()`, never as a return value.
pub trait MessageFeed: Send + Sync {
    /// Current snapshot.
    fn page(&self) -> FeedPage;

    /// Request `count` older messages. Calling this while `status` is not
    /// `CanLoadMore` is a caller error; implementations ignore it.
    fn load_more(&self, count: u32);

    /// Change notification. The value is a generation counter bumped on
    /// every page append, live insert, edit, or status transition.
    fn changes(&self) -> watch::Receiver<u64>;
}
