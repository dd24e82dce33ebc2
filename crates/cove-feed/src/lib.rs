//! Data layer for the client core: the paginated feed contract with push
//! invalidation, an in-memory reference feed, the shared pending-send queue,
//! the user directory cache, and the typing tracker.

pub mod directory;
pub mod feed;
pub mod local;
pub mod pending;
pub mod typing;

pub use directory::{ResolveUsers, UserDirectory};
pub use feed::{FeedPage, FeedStatus, MessageFeed};
pub use local::LocalFeed;
pub use pending::PendingQueue;
pub use typing::TypingTracker;
