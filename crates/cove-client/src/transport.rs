use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures_util::future::BoxFuture;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use cove_composer::error::{SendError, UploadError};
use cove_composer::transport::Transport;
use cove_feed::{LocalFeed, ResolveUsers};
use cove_types::api::{MessageAck, SendMessageRequest, UploadTarget};
use cove_types::models::{Attachment, ContentHandle, MessageAuthor, UserId};

/// Transport that lands sends straight into a [`LocalFeed`] after simulated
/// latency, echoing the client key the way the real backend does. Gives the
/// demo the full optimistic round trip without a server.
pub struct LoopbackTransport {
    feed: LocalFeed,
    viewer: MessageAuthor,
    latency_ms: u64,
}

impl LoopbackTransport {
    pub fn new(feed: LocalFeed, viewer: MessageAuthor, latency_ms: u64) -> Self {
        Self { feed, viewer, latency_ms }
    }

    fn jitter(&self) -> Duration {
        if self.latency_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::rng().random_range(self.latency_ms..self.latency_ms * 2);
        Duration::from_millis(ms)
    }
}

impl Transport for LoopbackTransport {
    fn issue_upload(&self) -> BoxFuture<'static, Result<UploadTarget, UploadError>> {
        let delay = self.jitter();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(UploadTarget {
                url: format!("loopback://upload/{}", Uuid::new_v4()),
                expires_at: Utc::now() + chrono::Duration::minutes(5),
            })
        })
    }

    fn upload(
        &self,
        target: UploadTarget,
        name: String,
        _mime: String,
        bytes: Bytes,
    ) -> BoxFuture<'static, Result<ContentHandle, UploadError>> {
        let delay = self.jitter();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            debug!(url = %target.url, name = %name, size = bytes.len(), "upload complete");
            Ok(ContentHandle(format!("content://{}/{}", Uuid::new_v4(), name)))
        })
    }

    fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> BoxFuture<'static, Result<MessageAck, SendError>> {
        let delay = self.jitter();
        let feed = self.feed.clone();
        let author = self.viewer.clone();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            let attachments: Vec<Attachment> = request
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    name: a.name,
                    size: a.size,
                    mime: a.mime,
                    content: a.content,
                    preview: None,
                })
                .collect();
            let parent = request.parent.and_then(|id| feed.parent_preview(id));
            let ack = feed.post(
                author,
                request.body,
                attachments,
                parent,
                Some(request.client_key),
            );
            Ok(ack)
        })
    }
}

/// Fixed workspace roster backing the user directory.
pub struct StaticRoster {
    crew: Vec<MessageAuthor>,
}

impl StaticRoster {
    pub fn default_crew() -> Self {
        let crew = ["ada", "grace", "lin", "noor"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| MessageAuthor {
                id: UserId(Uuid::from_u128(i as u128 + 1)),
                username: name.to_string(),
                avatar: Some(ContentHandle(format!("content://avatars/{name}"))),
            })
            .collect();
        Self { crew }
    }

    pub fn profiles(&self) -> Vec<MessageAuthor> {
        self.crew.clone()
    }
}

impl ResolveUsers for StaticRoster {
    fn fetch(&self, ids: &[UserId]) -> Vec<MessageAuthor> {
        self.crew.iter().filter(|p| ids.contains(&p.id)).cloned().collect()
    }
}
