use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use cove_types::api::MessageAck;
use cove_types::events::FeedEvent;
use cove_types::models::{
    Attachment, ClientKey, FeedTarget, Message, MessageAuthor, MessageId, ParentPreview,
    ReactionGroup,
};

use crate::feed::{FeedPage, FeedStatus, MessageFeed};

/// In-memory reference implementation of [`MessageFeed`].
///
/// Holds the full ascending history for one target and exposes a window of
/// the newest messages. `load_more` widens the window toward the start of
/// history. Tests can hold a requested page in flight (`hold_pages`) and
/// release it explicitly (`deliver_page`) to observe the `LoadingMore`
/// state; the demo leaves automatic delivery on.
#[derive(Clone)]
pub struct LocalFeed {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<FeedState>,
    changed: watch::Sender<u64>,
}

struct FeedState {
    target: FeedTarget,
    /// Full history, ascending by id.
    history: Vec<Message>,
    /// How many of the newest messages are exposed through `page()`.
    window: usize,
    status: FeedStatus,
    /// Requested page size awaiting delivery, if a load is in flight.
    pending_load: Option<u32>,
    auto_deliver: bool,
    next_seq: u64,
}

impl LocalFeed {
    pub fn new(target: FeedTarget) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(FeedState {
                    target,
                    history: Vec::new(),
                    window: 0,
                    status: FeedStatus::LoadingFirstPage,
                    pending_load: None,
                    auto_deliver: true,
                    next_seq: 1,
                }),
                changed,
            }),
        }
    }

    pub fn target(&self) -> FeedTarget {
        self.lock().target
    }

    /// Keep requested pages in flight until `deliver_page` is called.
    pub fn hold_pages(&self) {
        self.lock().auto_deliver = false;
    }

    /// Install the full history (ascending) and deliver the first page.
    pub fn seed(&self, history: Vec<Message>, page_size: u32) {
        {
            let mut state = self.lock();
            state.next_seq = history.iter().map(|m| m.id.raw() + 1).max().unwrap_or(1);
            state.window = (page_size as usize).min(history.len());
            state.status = if state.window == history.len() {
                FeedStatus::Exhausted
            } else {
                FeedStatus::CanLoadMore
            };
            state.history = history;
        }
        self.bump();
    }

    /// Drop the in-flight page request as a fetch failure would: the feed
    /// falls back to loadable and delivers nothing.
    pub fn fail_page(&self) {
        {
            let mut state = self.lock();
            if state.pending_load.take().is_none() {
                return;
            }
            state.status = FeedStatus::CanLoadMore;
        }
        self.bump();
    }

    /// Resolve the in-flight page request, if any.
    pub fn deliver_page(&self) {
        let delivered = {
            let mut state = self.lock();
            deliver_locked(&mut state)
        };
        if delivered {
            self.bump();
        }
    }

    /// Append a live message as the backend would, assigning the next id.
    /// Returns the ack the send mutation reports back to the caller.
    pub fn post(
        &self,
        author: MessageAuthor,
        body: String,
        attachments: Vec<Attachment>,
        parent: Option<ParentPreview>,
        client_key: Option<ClientKey>,
    ) -> MessageAck {
        let ack = {
            let mut state = self.lock();
            let id = MessageId::from_raw(state.next_seq);
            state.next_seq += 1;
            let created_at = Utc::now();
            let message = Message {
                id,
                target: state.target,
                author,
                body,
                created_at,
                edited_at: None,
                parent,
                forwarded_from: None,
                attachments,
                reactions: Vec::new(),
                pinned: false,
                saved_by_viewer: false,
                client_key,
            };
            state.history.push(message);
            // The window tracks the newest edge, so a live insert widens it.
            state.window += 1;
            MessageAck { id, created_at }
        };
        self.bump();
        ack
    }

    /// Compact projection of a message for rendering a reply header.
    pub fn parent_preview(&self, id: MessageId) -> Option<ParentPreview> {
        let state = self.lock();
        state.history.iter().find(|m| m.id == id).map(|m| ParentPreview {
            id,
            author_username: m.author.username.clone(),
            excerpt: m.body.chars().take(80).collect(),
        })
    }

    /// Apply a pushed event. Events scoped to another target are ignored.
    pub fn apply(&self, event: &FeedEvent) {
        let mutated = {
            let mut state = self.lock();
            if event.target() != state.target {
                return;
            }
            match event {
                FeedEvent::MessageCreate { message } => {
                    state.history.push(message.clone());
                    state.window += 1;
                    true
                }
                FeedEvent::MessageUpdate { id, body, edited_at, .. } => {
                    match state.history.iter_mut().find(|m| m.id == *id) {
                        Some(m) => {
                            m.body = body.clone();
                            m.edited_at = Some(*edited_at);
                            true
                        }
                        None => false,
                    }
                }
                FeedEvent::ReactionAdd { message_id, user_id, emoji, .. } => {
                    match state.history.iter_mut().find(|m| m.id == *message_id) {
                        Some(m) => {
                            let idx = match m.reactions.iter().position(|g| g.emoji == *emoji) {
                                Some(i) => i,
                                None => {
                                    m.reactions.push(ReactionGroup {
                                        emoji: emoji.clone(),
                                        count: 0,
                                        user_ids: Vec::new(),
                                    });
                                    m.reactions.len() - 1
                                }
                            };
                            let group = &mut m.reactions[idx];
                            if !group.user_ids.contains(user_id) {
                                group.user_ids.push(*user_id);
                                group.count = group.user_ids.len();
                            }
                            true
                        }
                        None => false,
                    }
                }
                FeedEvent::ReactionRemove { message_id, user_id, emoji, .. } => {
                    match state.history.iter_mut().find(|m| m.id == *message_id) {
                        Some(m) => {
                            if let Some(group) = m.reactions.iter_mut().find(|g| g.emoji == *emoji)
                            {
                                group.user_ids.retain(|u| u != user_id);
                                group.count = group.user_ids.len();
                            }
                            m.reactions.retain(|g| !g.user_ids.is_empty());
                            true
                        }
                        None => false,
                    }
                }
                // Typing state lives in the typing tracker, not the feed.
                FeedEvent::TypingStart { .. } => false,
            }
        };
        if mutated {
            self.bump();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.inner.changed.send_modify(|v| *v += 1);
    }
}

fn deliver_locked(state: &mut FeedState) -> bool {
    let Some(count) = state.pending_load.take() else {
        return false;
    };
    state.window = (state.window + count as usize).min(state.history.len());
    state.status = if state.window == state.history.len() {
        FeedStatus::Exhausted
    } else {
        FeedStatus::CanLoadMore
    };
    debug!(window = state.window, status = ?state.status, "page delivered");
    true
}

impl MessageFeed for LocalFeed {
    fn page(&self) -> FeedPage {
        let state = self.lock();
        let start = state.history.len() - state.window;
        let results: Arc<[Message]> =
            state.history[start..].iter().rev().cloned().collect::<Vec<_>>().into();
        FeedPage { results, status: state.status }
    }

    fn load_more(&self, count: u32) {
        {
            let mut state = self.lock();
            if state.status != FeedStatus::CanLoadMore {
                warn!(status = ?state.status, "load_more called while not loadable, ignoring");
                return;
            }
            state.status = FeedStatus::LoadingMore;
            state.pending_load = Some(count);
            if state.auto_deliver {
                deliver_locked(&mut state);
            }
        }
        self.bump();
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changed.subscribe()
    }
}
