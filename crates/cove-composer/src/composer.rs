use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cove_feed::{PendingQueue, UserDirectory};
use cove_types::api::{AttachmentPayload, MessageAck, SendMessageRequest};
use cove_types::models::{
    ClientKey, Delivery, FeedTarget, MessageAuthor, MessageId, OptimisticAttachment,
    OptimisticMessage, ParentPreview, PreviewHandle, UserId,
};

use crate::draft::{Draft, DraftAttachment};
use crate::error::SendError;
use crate::mentions::{MentionPopup, mention_query};
use crate::preview::PreviewRegistry;
use crate::transport::Transport;

/// What happened to an Enter keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// The draft was queued for sending
    Submitted(ClientKey),
    /// Shift was held: a newline went into the body
    Newline,
    /// The mention popup was open: the highlighted suggestion was confirmed
    MentionConfirmed,
    /// A previous send is still in flight
    Blocked,
    /// Nothing to send
    Ignored,
}

/// Everything needed to (re)run one send, retained on failure so a retry
/// does not depend on the long-cleared draft.
struct SendJob {
    key: ClientKey,
    target: FeedTarget,
    body: String,
    parent: Option<MessageId>,
    mentions: Vec<UserId>,
    attachments: Vec<JobAttachment>,
    previews: Vec<PreviewHandle>,
}

struct JobAttachment {
    name: String,
    size: u64,
    mime: String,
    bytes: Bytes,
}

/// Captures input for one target and turns submissions into optimistic
/// entries plus an asynchronous upload-then-mutate pipeline.
///
/// The synchronous half of a submit always runs in this order: build the
/// optimistic projection, clear the draft, append to the pending queue.
/// Everything network-shaped happens on a spawned task afterwards.
pub struct Composer {
    target: FeedTarget,
    viewer: MessageAuthor,
    directory: Arc<UserDirectory>,
    previews: PreviewRegistry,
    pending: PendingQueue,
    transport: Arc<dyn Transport>,
    draft: Draft,
    popup: Option<MentionPopup>,
    in_flight: Arc<AtomicBool>,
    failed_jobs: Arc<Mutex<HashMap<ClientKey, SendJob>>>,
    current_task: Option<JoinHandle<()>>,
}

impl Composer {
    pub fn new(
        target: FeedTarget,
        viewer: MessageAuthor,
        directory: Arc<UserDirectory>,
        pending: PendingQueue,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            target,
            viewer,
            directory,
            previews: PreviewRegistry::new(),
            pending,
            transport,
            draft: Draft::default(),
            popup: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            failed_jobs: Arc::new(Mutex::new(HashMap::new())),
            current_task: None,
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn mention_popup(&self) -> Option<&MentionPopup> {
        self.popup.as_ref()
    }

    /// Replace the body text and refresh the mention popup.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.draft.body = body.into();
        self.refresh_popup();
    }

    pub fn set_reply(&mut self, parent: ParentPreview) {
        self.draft.reply = Some(parent);
    }

    pub fn clear_reply(&mut self) {
        self.draft.reply = None;
    }

    /// Queue a file. Image and video payloads get a local preview handle
    /// right away so the pending chip can render one.
    pub fn attach(&mut self, name: impl Into<String>, mime: impl Into<String>, bytes: Bytes) {
        let name = name.into();
        let mime = mime.into();
        let preview = self.previews.create(&mime, &bytes);
        self.draft.attachments.push(DraftAttachment {
            name,
            size: bytes.len() as u64,
            mime,
            bytes,
            preview,
        });
    }

    /// Drop a queued file before sending, releasing its preview.
    pub fn remove_attachment(&mut self, index: usize) {
        if index >= self.draft.attachments.len() {
            return;
        }
        let removed = self.draft.attachments.remove(index);
        if let Some(handle) = removed.preview {
            self.previews.release(handle);
        }
    }

    pub fn select_next_mention(&mut self) {
        if let Some(popup) = self.popup.as_mut() {
            popup.select_next();
        }
    }

    pub fn select_prev_mention(&mut self) {
        if let Some(popup) = self.popup.as_mut() {
            popup.select_prev();
        }
    }

    /// Insert the highlighted suggestion, replacing the in-progress query.
    pub fn confirm_mention(&mut self) -> bool {
        let Some(popup) = self.popup.take() else {
            return false;
        };
        let Some(profile) = popup.selection().cloned() else {
            return false;
        };
        let stripped = self.draft.body.len() - popup.query.len() - 1;
        self.draft.body.truncate(stripped);
        self.draft.body.push('@');
        self.draft.body.push_str(&profile.username);
        self.draft.body.push(' ');
        if !self.draft.mentions.contains(&profile.id) {
            self.draft.mentions.push(profile.id);
        }
        true
    }

    /// Plain Enter submits; Shift+Enter inserts a newline; with the mention
    /// popup open, Enter confirms the suggestion instead.
    pub fn on_enter(&mut self, shift: bool) -> EnterOutcome {
        if !shift && self.popup.is_some() {
            self.confirm_mention();
            return EnterOutcome::MentionConfirmed;
        }
        if shift {
            self.draft.body.push('\n');
            return EnterOutcome::Newline;
        }
        self.submit()
    }

    /// Synchronously queue the draft and kick off the send pipeline.
    pub fn submit(&mut self) -> EnterOutcome {
        if self.draft.is_empty() {
            return EnterOutcome::Ignored;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return EnterOutcome::Blocked;
        }

        let key = ClientKey::generate();

        // Optimistic projection from the input state as it stands.
        let optimistic = OptimisticMessage {
            key,
            author: self.viewer.clone(),
            body: self.draft.body.clone(),
            parent: self.draft.reply.clone(),
            attachments: self
                .draft
                .attachments
                .iter()
                .map(|a| OptimisticAttachment {
                    name: a.name.clone(),
                    size: a.size,
                    mime: a.mime.clone(),
                    preview: a.preview,
                })
                .collect(),
            queued_at: Utc::now(),
            delivery: Delivery::Sending,
        };

        // The input clears before any network work starts.
        let draft = std::mem::take(&mut self.draft);
        self.popup = None;

        self.pending.append(optimistic);

        let job = SendJob {
            key,
            target: self.target,
            body: draft.body,
            parent: draft.reply.map(|p| p.id),
            mentions: draft.mentions,
            previews: draft.attachments.iter().filter_map(|a| a.preview).collect(),
            attachments: draft
                .attachments
                .into_iter()
                .map(|a| JobAttachment { name: a.name, size: a.size, mime: a.mime, bytes: a.bytes })
                .collect(),
        };
        self.spawn(job);
        EnterOutcome::Submitted(key)
    }

    /// Re-run a failed send with its original content and client key.
    pub fn retry_failed(&mut self, key: ClientKey) -> bool {
        let Some(job) = self.take_failed(key) else {
            return false;
        };
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.lock_failed().insert(key, job);
            return false;
        }
        if let Some(mut entry) = self.pending.remove(key) {
            entry.delivery = Delivery::Sending;
            self.pending.append(entry);
        }
        self.spawn(job);
        true
    }

    /// Drop a failed send for good.
    pub fn dismiss_failed(&mut self, key: ClientKey) -> bool {
        self.take_failed(key);
        self.pending.remove(key).is_some()
    }

    /// Wait for the in-flight send, if any, to settle. Used by tests and by
    /// orderly shutdown.
    pub async fn flush(&mut self) {
        if let Some(task) = self.current_task.take() {
            let _ = task.await;
        }
    }

    fn refresh_popup(&mut self) {
        self.popup = match mention_query(&self.draft.body) {
            Some(query) => {
                let candidates = self.directory.search_prefix(query);
                if candidates.is_empty() {
                    None
                } else {
                    Some(MentionPopup { query: query.to_string(), candidates, selected: 0 })
                }
            }
            None => None,
        };
    }

    fn spawn(&mut self, job: SendJob) {
        let transport = self.transport.clone();
        let pending = self.pending.clone();
        let previews = self.previews.clone();
        let in_flight = self.in_flight.clone();
        let failed_jobs = self.failed_jobs.clone();
        self.current_task = Some(tokio::spawn(run_send(
            job,
            transport,
            pending,
            previews,
            in_flight,
            failed_jobs,
        )));
    }

    fn take_failed(&self, key: ClientKey) -> Option<SendJob> {
        self.lock_failed().remove(&key)
    }

    fn lock_failed(&self) -> std::sync::MutexGuard<'_, HashMap<ClientKey, SendJob>> {
        self.failed_jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The asynchronous half: upload attachments, call the mutation, then
/// release the local previews whatever the outcome.
async fn run_send(
    mut job: SendJob,
    transport: Arc<dyn Transport>,
    pending: PendingQueue,
    previews: PreviewRegistry,
    in_flight: Arc<AtomicBool>,
    failed_jobs: Arc<Mutex<HashMap<ClientKey, SendJob>>>,
) {
    let outcome = send_once(&job, transport.as_ref()).await;

    for handle in job.previews.drain(..) {
        previews.release(handle);
    }
    in_flight.store(false, Ordering::SeqCst);

    match outcome {
        Ok(ack) => {
            debug!(id = ack.id.raw(), "send confirmed");
        }
        Err(err) => {
            warn!(error = %err, "send failed, keeping entry for retry");
            pending.mark_failed(job.key, err.to_string());
            failed_jobs.lock().unwrap_or_else(|e| e.into_inner()).insert(job.key, job);
        }
    }
}

async fn send_once(job: &SendJob, transport: &dyn Transport) -> Result<MessageAck, SendError> {
    let mut payloads = Vec::with_capacity(job.attachments.len());
    for attachment in &job.attachments {
        let target = transport.issue_upload().await?;
        let content = transport
            .upload(
                target,
                attachment.name.clone(),
                attachment.mime.clone(),
                attachment.bytes.clone(),
            )
            .await?;
        payloads.push(AttachmentPayload {
            name: attachment.name.clone(),
            size: attachment.size,
            mime: attachment.mime.clone(),
            content,
        });
    }

    transport
        .send_message(SendMessageRequest {
            target: job.target,
            body: job.body.clone(),
            attachments: payloads,
            parent: job.parent,
            mentions: job.mentions.clone(),
            client_key: job.key,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use futures_util::future::BoxFuture;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    use cove_types::api::UploadTarget;
    use cove_types::models::{ChannelId, ContentHandle};

    use crate::error::UploadError;

    fn target() -> FeedTarget {
        FeedTarget::Channel(ChannelId(Uuid::nil()))
    }

    fn viewer() -> MessageAuthor {
        MessageAuthor {
            id: UserId(Uuid::from_u128(1)),
            username: "ada".into(),
            avatar: None,
        }
    }

    struct MockTransport {
        sent: Mutex<Vec<SendMessageRequest>>,
        fail_send: AtomicBool,
        fail_upload: AtomicBool,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_send: AtomicBool::new(false),
                fail_upload: AtomicBool::new(false),
                gate: Mutex::new(None),
            })
        }

        fn sent(&self) -> Vec<SendMessageRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn issue_upload(&self) -> BoxFuture<'static, Result<UploadTarget, UploadError>> {
            Box::pin(async {
                Ok(UploadTarget { url: "mock://upload".into(), expires_at: Utc::now() })
            })
        }

        fn upload(
            &self,
            _target: UploadTarget,
            name: String,
            _mime: String,
            _bytes: Bytes,
        ) -> BoxFuture<'static, Result<ContentHandle, UploadError>> {
            let fail = self.fail_upload.load(Ordering::SeqCst);
            Box::pin(async move {
                if fail {
                    Err(UploadError::Failed("disk full".into()))
                } else {
                    Ok(ContentHandle(format!("content://{name}")))
                }
            })
        }

        fn send_message(
            &self,
            request: SendMessageRequest,
        ) -> BoxFuture<'static, Result<MessageAck, SendError>> {
            self.sent.lock().unwrap().push(request.clone());
            let fail = self.fail_send.load(Ordering::SeqCst);
            let gate = self.gate.lock().unwrap().take();
            Box::pin(async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                if fail {
                    Err(SendError::Rejected("message too long".into()))
                } else {
                    Ok(MessageAck { id: MessageId::from_raw(1), created_at: Utc::now() })
                }
            })
        }
    }

    fn composer(transport: Arc<MockTransport>) -> (Composer, PendingQueue) {
        let pending = PendingQueue::new();
        let directory = Arc::new(UserDirectory::new(Arc::new(EmptyRoster)));
        let composer = Composer::new(target(), viewer(), directory, pending.clone(), transport);
        (composer, pending)
    }

    struct EmptyRoster;

    impl cove_feed::ResolveUsers for EmptyRoster {
        fn fetch(&self, _ids: &[UserId]) -> Vec<MessageAuthor> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_submit_queues_optimistic_and_clears_draft() {
        let transport = MockTransport::new();
        let (mut composer, pending) = composer(transport.clone());

        composer.set_body("hello");
        let outcome = composer.submit();
        assert!(matches!(outcome, EnterOutcome::Submitted(_)));

        // Synchronous effects: entry visible, draft cleared.
        assert_eq!(pending.snapshot()[0].body, "hello");
        assert_eq!(pending.snapshot()[0].delivery, Delivery::Sending);
        assert!(composer.draft().body.is_empty());

        composer.flush().await;
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "hello");
        // Clearing the entry is the synchronizer's job, not the pipeline's.
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_second_submit_blocked_while_in_flight() {
        let transport = MockTransport::new();
        let (tx, rx) = oneshot::channel();
        *transport.gate.lock().unwrap() = Some(rx);
        let (mut composer, _pending) = composer(transport.clone());

        composer.set_body("first");
        assert!(matches!(composer.submit(), EnterOutcome::Submitted(_)));

        composer.set_body("second");
        assert_eq!(composer.submit(), EnterOutcome::Blocked);
        // The blocked draft is untouched.
        assert_eq!(composer.draft().body, "second");

        tx.send(()).unwrap();
        composer.flush().await;
        assert!(matches!(composer.submit(), EnterOutcome::Submitted(_)));
    }

    #[tokio::test]
    async fn test_removing_attachment_shrinks_mutation_payload() {
        let transport = MockTransport::new();
        let (mut composer, _pending) = composer(transport.clone());

        composer.attach("a.png", "image/png", Bytes::from_static(b"aaaa"));
        composer.attach("b.png", "image/png", Bytes::from_static(b"bbbb"));
        assert_eq!(composer.previews().live_count(), 2);

        composer.remove_attachment(0);
        // The dropped file's preview is released right away.
        assert_eq!(composer.previews().live_count(), 1);

        composer.set_body("look");
        composer.submit();
        composer.flush().await;

        let sent = transport.sent();
        assert_eq!(sent[0].attachments.len(), 1);
        assert_eq!(sent[0].attachments[0].name, "b.png");
        assert_eq!(sent[0].attachments[0].content, ContentHandle("content://b.png".into()));
    }

    #[tokio::test]
    async fn test_previews_released_after_success() {
        let transport = MockTransport::new();
        let (mut composer, _pending) = composer(transport);

        composer.attach("a.png", "image/png", Bytes::from_static(b"aaaa"));
        composer.set_body("pic");
        composer.submit();
        assert_eq!(composer.previews().live_count(), 1);

        composer.flush().await;
        assert_eq!(composer.previews().live_count(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_tags_entry_and_releases_previews() {
        let transport = MockTransport::new();
        transport.fail_send.store(true, Ordering::SeqCst);
        let (mut composer, pending) = composer(transport);

        composer.attach("a.png", "image/png", Bytes::from_static(b"aaaa"));
        composer.set_body("doomed");
        composer.submit();
        composer.flush().await;

        let entries = pending.snapshot();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_failed());
        assert_eq!(composer.previews().live_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_fails_only_that_message() {
        let transport = MockTransport::new();
        transport.fail_upload.store(true, Ordering::SeqCst);
        let (mut composer, pending) = composer(transport.clone());

        composer.attach("a.png", "image/png", Bytes::from_static(b"aaaa"));
        composer.set_body("with file");
        composer.submit();
        composer.flush().await;

        assert!(pending.snapshot()[0].is_failed());
        // The mutation was never attempted.
        assert!(transport.sent().is_empty());

        // A following text-only send is unaffected.
        transport.fail_upload.store(false, Ordering::SeqCst);
        composer.set_body("plain");
        composer.submit();
        composer.flush().await;
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_failed_reuses_client_key() {
        let transport = MockTransport::new();
        transport.fail_send.store(true, Ordering::SeqCst);
        let (mut composer, pending) = composer(transport.clone());

        composer.set_body("flaky");
        let EnterOutcome::Submitted(key) = composer.submit() else {
            panic!("expected submit");
        };
        composer.flush().await;
        assert!(pending.snapshot()[0].is_failed());

        transport.fail_send.store(false, Ordering::SeqCst);
        assert!(composer.retry_failed(key));
        assert_eq!(pending.snapshot()[0].delivery, Delivery::Sending);
        composer.flush().await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].client_key, key);
        assert_eq!(sent[1].body, "flaky");
    }

    #[tokio::test]
    async fn test_dismiss_failed_drops_entry() {
        let transport = MockTransport::new();
        transport.fail_send.store(true, Ordering::SeqCst);
        let (mut composer, pending) = composer(transport);

        composer.set_body("gone");
        let EnterOutcome::Submitted(key) = composer.submit() else {
            panic!("expected submit");
        };
        composer.flush().await;

        assert!(composer.dismiss_failed(key));
        assert!(pending.is_empty());
        assert!(!composer.retry_failed(key));
    }

    #[tokio::test]
    async fn test_enter_contract() {
        let transport = MockTransport::new();
        let pending = PendingQueue::new();
        let directory = Arc::new(UserDirectory::new(Arc::new(EmptyRoster)));
        directory.prime(vec![
            MessageAuthor { id: UserId(Uuid::from_u128(7)), username: "grace".into(), avatar: None },
            MessageAuthor { id: UserId(Uuid::from_u128(8)), username: "grant".into(), avatar: None },
        ]);
        let mut composer =
            Composer::new(target(), viewer(), directory, pending.clone(), transport);

        // Shift+Enter inserts a newline, nothing is sent.
        composer.set_body("line one");
        assert_eq!(composer.on_enter(true), EnterOutcome::Newline);
        assert_eq!(composer.draft().body, "line one\n");
        assert!(pending.is_empty());

        // With the popup open, Enter confirms the suggestion.
        composer.set_body("ping @gr");
        assert!(composer.mention_popup().is_some());
        composer.select_next_mention();
        assert_eq!(composer.on_enter(false), EnterOutcome::MentionConfirmed);
        assert_eq!(composer.draft().body, "ping @grant ");
        assert_eq!(composer.draft().mentions, vec![UserId(Uuid::from_u128(8))]);
        assert!(composer.mention_popup().is_none());

        // Plain Enter now submits.
        assert!(matches!(composer.on_enter(false), EnterOutcome::Submitted(_)));
        let entries = pending.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "ping @grant ");
    }

    #[tokio::test]
    async fn test_empty_draft_is_ignored() {
        let transport = MockTransport::new();
        let (mut composer, pending) = composer(transport);

        composer.set_body("   ");
        assert_eq!(composer.submit(), EnterOutcome::Ignored);
        assert!(pending.is_empty());
    }
}
