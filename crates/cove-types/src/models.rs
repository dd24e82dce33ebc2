use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

/// Client-generated correlation key for a send in flight. Never comparable
/// to a server-assigned `MessageId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey(pub Uuid);

impl ClientKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Server-assigned message identifier. Monotonic per feed target, so ordering
/// by id is consistent with ordering by creation time within one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    pub fn from_raw(seq: u64) -> Self {
        Self(seq)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Either a channel or a direct conversation. Exactly one, always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum FeedTarget {
    Channel(ChannelId),
    Conversation(ConversationId),
}

/// Opaque handle to stored content (attachment payloads, avatars, previews).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHandle(pub String);

/// Handle to a locally-created attachment preview. Valid only inside this
/// client process, released once the send settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewHandle(pub Uuid);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<ContentHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub content: ContentHandle,
    pub preview: Option<ContentHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<UserId>,
}

/// Compact view of the message a reply points at, enough to render the
/// reply header without fetching the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentPreview {
    pub id: MessageId,
    pub author_username: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardOrigin {
    pub message_id: MessageId,
    pub author_username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub target: FeedTarget,
    pub author: MessageAuthor,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub parent: Option<ParentPreview>,
    pub forwarded_from: Option<ForwardOrigin>,
    pub attachments: Vec<Attachment>,
    pub reactions: Vec<ReactionGroup>,
    pub pinned: bool,
    pub saved_by_viewer: bool,
    /// Echoed back from the send request when the backend supports it.
    /// `None` on messages from other clients and on feeds without echo.
    pub client_key: Option<ClientKey>,
}

impl Message {
    pub fn is_own(&self, viewer: UserId) -> bool {
        self.author.id == viewer
    }
}

/// Delivery state of a locally-queued send. Failure is explicit and stays
/// visible until the user dismisses or retries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sending,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticAttachment {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub preview: Option<PreviewHandle>,
}

/// Client-local projection of a send in flight, rendered at the tail of the
/// timeline until the confirmed message shows up in the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticMessage {
    pub key: ClientKey,
    pub author: MessageAuthor,
    pub body: String,
    pub parent: Option<ParentPreview>,
    pub attachments: Vec<OptimisticAttachment>,
    pub queued_at: DateTime<Utc>,
    pub delivery: Delivery,
}

impl OptimisticMessage {
    pub fn is_failed(&self) -> bool {
        matches!(self.delivery, Delivery::Failed(_))
    }
}
