use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use cove_types::models::{MessageAuthor, UserId};

/// Source the directory pulls missing profiles from.
pub trait ResolveUsers: Send + Sync {
    /// Fetch profiles for the given ids. Unknown ids are simply absent from
    /// the result.
    fn fetch(&self, ids: &[UserId]) -> Vec<MessageAuthor>;
}

/// Profile cache with keyed lookup and fetch-missing-then-merge semantics.
/// Owned at the root of the component tree and passed down by handle; there
/// is no ambient module-level cache anywhere in this codebase.
pub struct UserDirectory {
    source: Arc<dyn ResolveUsers>,
    cache: RwLock<HashMap<UserId, MessageAuthor>>,
}

impl UserDirectory {
    pub fn new(source: Arc<dyn ResolveUsers>) -> Self {
        Self { source, cache: RwLock::new(HashMap::new()) }
    }

    /// Cached lookup only; never hits the source.
    pub fn get(&self, id: UserId) -> Option<MessageAuthor> {
        self.read().get(&id).cloned()
    }

    /// Resolve ids, fetching only the ones not cached yet, then merging the
    /// result. Returns the known profiles in input order.
    pub fn resolve(&self, ids: &[UserId]) -> Vec<MessageAuthor> {
        let missing: Vec<UserId> = {
            let cache = self.read();
            ids.iter().copied().filter(|id| !cache.contains_key(id)).collect()
        };

        if !missing.is_empty() {
            let fetched = self.source.fetch(&missing);
            debug!(requested = missing.len(), fetched = fetched.len(), "directory fetch");
            let mut cache = self.write();
            for profile in fetched {
                cache.insert(profile.id, profile);
            }
        }

        let cache = self.read();
        ids.iter().filter_map(|id| cache.get(id).cloned()).collect()
    }

    /// Merge profiles already in hand (e.g. from a roster payload).
    pub fn prime(&self, profiles: Vec<MessageAuthor>) {
        let mut cache = self.write();
        for profile in profiles {
            cache.insert(profile.id, profile);
        }
    }

    /// Case-insensitive username prefix search over cached profiles, sorted
    /// by username. Backs the mention suggestion popup.
    pub fn search_prefix(&self, query: &str) -> Vec<MessageAuthor> {
        let query = query.to_lowercase();
        let mut hits: Vec<MessageAuthor> = self
            .read()
            .values()
            .filter(|p| p.username.to_lowercase().starts_with(&query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.username.cmp(&b.username));
        hits
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, MessageAuthor>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, MessageAuthor>> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }
}
