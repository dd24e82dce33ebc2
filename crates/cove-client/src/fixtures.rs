use chrono::{Duration, Utc};

use cove_types::models::{FeedTarget, Message, MessageAuthor, MessageId};

const PHRASES: &[&str] = &[
    "morning, picking the deploy back up",
    "staging looks clean so far",
    "pushed the fix for the flaky check",
    "can someone look at the review queue?",
    "done, left two comments",
    "rolling it out now",
    "metrics are flat, calling it good",
    "switching to the onboarding doc",
];

/// Deterministic channel history: bursts of three messages per author with
/// short gaps inside a burst and long gaps between them, stretching far
/// enough back to cross calendar days and fill several pages.
pub fn history(target: FeedTarget, crew: &[MessageAuthor], count: usize) -> Vec<Message> {
    let burst_gap = Duration::seconds(40);
    let break_gap = Duration::minutes(25);

    // Walk backwards from now so the newest message is recent.
    let mut total = Duration::zero();
    for i in 0..count {
        total += if i % 3 == 0 { break_gap } else { burst_gap };
    }
    let mut at = Utc::now() - total;

    (0..count)
        .map(|i| {
            at += if i % 3 == 0 { break_gap } else { burst_gap };
            let author = crew[(i / 3) % crew.len()].clone();
            Message {
                id: MessageId::from_raw(i as u64 + 1),
                target,
                author,
                body: PHRASES[i % PHRASES.len()].to_string(),
                created_at: at,
                edited_at: None,
                parent: None,
                forwarded_from: None,
                attachments: Vec::new(),
                reactions: Vec::new(),
                pinned: false,
                saved_by_viewer: false,
                client_key: None,
            }
        })
        .collect()
}
