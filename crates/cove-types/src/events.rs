use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FeedTarget, Message, MessageId, UserId};

/// Live events pushed into the feed layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedEvent {
    /// A new message was posted
    MessageCreate { message: Message },

    /// An existing message's body was edited
    MessageUpdate {
        target: FeedTarget,
        id: MessageId,
        body: String,
        edited_at: DateTime<Utc>,
    },

    /// A reaction was added to a message
    ReactionAdd {
        target: FeedTarget,
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
    },

    /// A reaction was removed from a message
    ReactionRemove {
        target: FeedTarget,
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
    },

    /// A user started typing
    TypingStart {
        target: FeedTarget,
        user_id: UserId,
        username: String,
    },
}

impl FeedEvent {
    /// Returns the feed target this event is scoped to.
    pub fn target(&self) -> FeedTarget {
        match self {
            Self::MessageCreate { message } => message.target,
            Self::MessageUpdate { target, .. } => *target,
            Self::ReactionAdd { target, .. } => *target,
            Self::ReactionRemove { target, .. } => *target,
            Self::TypingStart { target, .. } => *target,
        }
    }
}
