use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use cove_types::models::{ClientKey, Delivery, OptimisticMessage};

use crate::feed::FeedPage;

/// Queue of locally-pending sends, shared between the composer (which
/// appends on submit and settles failures) and the timeline synchronizer
/// (which clears entries once the confirmed feed covers them). No other
/// code path mutates it.
#[derive(Clone)]
pub struct PendingQueue {
    inner: Arc<Inner>,
}

struct Inner {
    entries: Mutex<Vec<OptimisticMessage>>,
    changed: watch::Sender<u64>,
}

impl PendingQueue {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner { entries: Mutex::new(Vec::new()), changed }),
        }
    }

    /// Synchronous append at submit time.
    pub fn append(&self, message: OptimisticMessage) {
        self.lock().push(message);
        self.bump();
    }

    /// Tag an entry as failed. The entry stays visible; the typed content is
    /// never dropped on the floor.
    pub fn mark_failed(&self, key: ClientKey, reason: impl Into<String>) -> bool {
        let tagged = {
            let mut entries = self.lock();
            match entries.iter_mut().find(|e| e.key == key) {
                Some(entry) => {
                    entry.delivery = Delivery::Failed(reason.into());
                    true
                }
                None => false,
            }
        };
        if tagged {
            self.bump();
        }
        tagged
    }

    /// Remove an entry outright (user dismissed a failed send, or a retry is
    /// taking it over).
    pub fn remove(&self, key: ClientKey) -> Option<OptimisticMessage> {
        let removed = {
            let mut entries = self.lock();
            let idx = entries.iter().position(|e| e.key == key)?;
            Some(entries.remove(idx))
        };
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Clear entries the confirmed feed now covers.
    ///
    /// When the feed echoes client keys, exactly the matched entries are
    /// cleared. When it does not (no key anywhere in the page), confirmed
    /// count growth clears every in-flight entry, keeping the observable
    /// behavior of feeds without echo support. Failed entries are never
    /// cleared implicitly.
    pub fn reconcile(&self, page: &FeedPage, count_grew: bool) -> usize {
        let cleared = {
            let mut entries = self.lock();
            let echoed: HashSet<ClientKey> =
                page.results.iter().filter_map(|m| m.client_key).collect();
            let before = entries.len();
            if echoed.is_empty() {
                if count_grew {
                    entries.retain(|e| e.is_failed());
                }
            } else {
                entries.retain(|e| e.is_failed() || !echoed.contains(&e.key));
            }
            before - entries.len()
        };
        if cleared > 0 {
            debug!(cleared, "pending sends confirmed");
            self.bump();
        }
        cleared
    }

    pub fn snapshot(&self) -> Vec<OptimisticMessage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changed.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<OptimisticMessage>> {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.inner.changed.send_modify(|v| *v += 1);
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedStatus;
    use chrono::Utc;
    use cove_types::models::{FeedTarget, Message, MessageAuthor, MessageId, UserId};
    use uuid::Uuid;

    fn entry(key: ClientKey) -> OptimisticMessage {
        OptimisticMessage {
            key,
            author: MessageAuthor {
                id: UserId(Uuid::nil()),
                username: "ada".into(),
                avatar: None,
            },
            body: "hi".into(),
            parent: None,
            attachments: Vec::new(),
            queued_at: Utc::now(),
            delivery: Delivery::Sending,
        }
    }

    fn page_with(keys: &[Option<ClientKey>]) -> FeedPage {
        let results: Vec<Message> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| Message {
                id: MessageId::from_raw(i as u64 + 1),
                target: FeedTarget::Channel(cove_types::models::ChannelId(Uuid::nil())),
                author: MessageAuthor {
                    id: UserId(Uuid::nil()),
                    username: "ada".into(),
                    avatar: None,
                },
                body: "m".into(),
                created_at: Utc::now(),
                edited_at: None,
                parent: None,
                forwarded_from: None,
                attachments: Vec::new(),
                reactions: Vec::new(),
                pinned: false,
                saved_by_viewer: false,
                client_key: *key,
            })
            .collect();
        FeedPage { results: results.into(), status: FeedStatus::Exhausted }
    }

    #[test]
    fn test_reconcile_by_key_match() {
        let queue = PendingQueue::new();
        let mine = ClientKey::generate();
        let other = ClientKey::generate();
        queue.append(entry(mine));
        queue.append(entry(other));

        let cleared = queue.reconcile(&page_with(&[Some(mine)]), true);
        assert_eq!(cleared, 1);
        let left = queue.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].key, other);
    }

    #[test]
    fn test_reconcile_count_growth_fallback() {
        let queue = PendingQueue::new();
        queue.append(entry(ClientKey::generate()));
        queue.append(entry(ClientKey::generate()));

        // No echoed key anywhere: growth clears every in-flight entry.
        assert_eq!(queue.reconcile(&page_with(&[None, None]), true), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reconcile_without_growth_keeps_entries() {
        let queue = PendingQueue::new();
        queue.append(entry(ClientKey::generate()));
        assert_eq!(queue.reconcile(&page_with(&[None]), false), 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_failed_entries_survive_reconcile() {
        let queue = PendingQueue::new();
        let failed = ClientKey::generate();
        queue.append(entry(failed));
        assert!(queue.mark_failed(failed, "backend rejected"));

        assert_eq!(queue.reconcile(&page_with(&[None, None]), true), 0);
        let left = queue.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].delivery, Delivery::Failed("backend rejected".into()));
    }

    #[test]
    fn test_remove_takes_entry_out() {
        let queue = PendingQueue::new();
        let key = ClientKey::generate();
        queue.append(entry(key));
        assert!(queue.remove(key).is_some());
        assert!(queue.remove(key).is_none());
        assert!(queue.is_empty());
    }
}
