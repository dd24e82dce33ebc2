use chrono::NaiveDate;

use cove_feed::{FeedPage, FeedStatus};
use cove_types::models::{Message, OptimisticMessage};

/// Messages from the same author within this many seconds collapse into a
/// compact row without the avatar/name header.
pub const COMPACT_WINDOW_SECS: i64 = 120;

/// One row of the rendered timeline, in display order (oldest first).
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    /// First page has not arrived; render a loading indicator
    LoadingFirstPage,
    /// An older page is in flight; render a spinner at the top
    LoadingOlder,
    /// Invisible marker that triggers pagination when it scrolls into view
    LoadMoreSentinel,
    /// A page request failed; render a manual retry affordance
    LoadFailed,
    /// Full history is loaded on a feed longer than one page
    ConversationStart,
    /// Empty feed, no search active
    NoMessagesYet,
    /// Active search matched nothing
    NoSearchMatches,
    /// Consecutive messages crossed a calendar day
    DateSeparator(NaiveDate),
    /// A confirmed message. `compact` rows render without their own header.
    Msg { message: Message, compact: bool },
    /// A locally-pending send, rendered dimmed with interactions disabled,
    /// or with a failure indicator when its delivery tag says so.
    Pending(OptimisticMessage),
}

/// Reverse a descending page into ascending display order. Pure: the
/// delivered slice is read through shared references and never mutated.
pub fn chronological(results: &[Message]) -> Vec<Message> {
    results.iter().rev().cloned().collect()
}

pub struct PlanInput<'a> {
    pub page: &'a FeedPage,
    pub pending: &'a [OptimisticMessage],
    pub search: Option<&'a [Message]>,
    pub batch_size: u32,
    pub load_failed: bool,
}

/// Build the full render plan for one paint.
pub fn build_plan(input: PlanInput<'_>) -> Vec<TimelineEntry> {
    // Search mode fully replaces the paginated feed; pagination and the
    // optimistic tail are suspended while it is active.
    if let Some(results) = input.search {
        if results.is_empty() {
            return vec![TimelineEntry::NoSearchMatches];
        }
        return grouped(results);
    }

    if input.page.status == FeedStatus::LoadingFirstPage {
        return vec![TimelineEntry::LoadingFirstPage];
    }

    let messages = chronological(&input.page.results);
    if messages.is_empty() && input.pending.is_empty() {
        return vec![TimelineEntry::NoMessagesYet];
    }

    let mut plan = Vec::with_capacity(messages.len() + input.pending.len() + 2);

    if input.load_failed {
        plan.push(TimelineEntry::LoadFailed);
    } else {
        match input.page.status {
            FeedStatus::CanLoadMore => plan.push(TimelineEntry::LoadMoreSentinel),
            FeedStatus::LoadingMore => plan.push(TimelineEntry::LoadingOlder),
            FeedStatus::Exhausted if messages.len() > input.batch_size as usize => {
                plan.push(TimelineEntry::ConversationStart);
            }
            _ => {}
        }
    }

    plan.extend(grouped(&messages));

    // The optimistic tail renders after every confirmed message.
    plan.extend(input.pending.iter().cloned().map(TimelineEntry::Pending));

    plan
}

/// Insert date separators and compute compact grouping over messages already
/// in display order. Separator placement comes first; a separator forces the
/// following message to render its full header even for an unchanged author.
fn grouped(messages: &[Message]) -> Vec<TimelineEntry> {
    let mut out = Vec::with_capacity(messages.len());
    let mut prev: Option<&Message> = None;

    for message in messages {
        let day = message.created_at.date_naive();
        let separated = match prev {
            Some(p) => {
                if p.created_at.date_naive() != day {
                    out.push(TimelineEntry::DateSeparator(day));
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        let compact = match prev {
            Some(p) if !separated => {
                p.author.id == message.author.id
                    && (message.created_at - p.created_at).num_seconds() < COMPACT_WINDOW_SECS
                    && message.parent.is_none()
                    && message.forwarded_from.is_none()
            }
            _ => false,
        };

        out.push(TimelineEntry::Msg { message: message.clone(), compact });
        prev = Some(message);
    }

    out
}
