use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use cove_types::models::{FeedTarget, UserId};

/// Typing indications lapse this long after the last start event unless
/// refreshed by another one.
const TYPING_WINDOW: Duration = Duration::from_secs(8);

/// Tracks who is currently typing in each target.
pub struct TypingTracker {
    window: Duration,
    entries: Mutex<HashMap<(FeedTarget, UserId), (String, Instant)>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::with_window(TYPING_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self { window, entries: Mutex::new(HashMap::new()) }
    }

    /// Record a typing start, refreshing the expiry for that user.
    pub fn observe(&self, target: FeedTarget, user_id: UserId, username: String) {
        self.lock().insert((target, user_id), (username, Instant::now()));
    }

    /// Usernames currently typing in `target`, sorted. Expired entries are
    /// pruned on the way out.
    pub fn active(&self, target: FeedTarget) -> Vec<String> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, (_, seen)| now.duration_since(*seen) < self.window);

        let mut names: Vec<String> = entries
            .iter()
            .filter(|((t, _), _)| *t == target)
            .map(|(_, (name, _))| name.clone())
            .collect();
        names.sort();
        names
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(FeedTarget, UserId), (String, Instant)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new()
    }
}
