use bytes::Bytes;

use cove_types::models::{ParentPreview, PreviewHandle, UserId};

/// A file queued in the composer, bytes still local.
#[derive(Debug, Clone)]
pub struct DraftAttachment {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub bytes: Bytes,
    pub preview: Option<PreviewHandle>,
}

/// Everything the viewer has typed or queued but not yet sent.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub body: String,
    pub reply: Option<ParentPreview>,
    pub attachments: Vec<DraftAttachment>,
    pub mentions: Vec<UserId>,
}

impl Draft {
    /// A draft with neither text nor files has nothing to send.
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty() && self.attachments.is_empty()
    }
}
