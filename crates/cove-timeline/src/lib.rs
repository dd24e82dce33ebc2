//! Message timeline synchronizer.
//!
//! Presents a single chronologically ordered, duplicate-free, scroll-stable
//! sequence of messages by merging a backward-paginated history feed, live
//! arrivals from the same feed, and the queue of locally-pending sends,
//! while preserving the viewer's scroll anchor through all three mutation
//! sources.

pub mod plan;
pub mod scroll;
pub mod sync;

pub use plan::{COMPACT_WINDOW_SECS, PlanInput, TimelineEntry, build_plan, chronological};
pub use scroll::{BOTTOM_THRESHOLD_PX, SavedView, ScrollAnchor, ScrollCmd, Viewport};
pub use sync::{DEFAULT_BATCH_SIZE, Timeline, TimelineConfig, TimelineEvent};
