use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ClientKey, ContentHandle, FeedTarget, MessageId, UserId};

// -- Send mutation --

/// Attachment metadata sent with the mutation after the bytes have been
/// uploaded and exchanged for a content handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub content: ContentHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub target: FeedTarget,
    pub body: String,
    pub attachments: Vec<AttachmentPayload>,
    pub parent: Option<MessageId>,
    pub mentions: Vec<UserId>,
    pub client_key: ClientKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAck {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
}

// -- Uploads --

/// Short-lived target issued before a direct upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
