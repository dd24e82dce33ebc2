use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use uuid::Uuid;

use cove_types::models::PreviewHandle;

/// Registry of locally-created attachment previews.
///
/// Previews exist from the moment a file lands in the composer until the
/// send settles, at which point they must be released. The live count makes
/// leaks observable.
#[derive(Clone)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<HashMap<PreviewHandle, String>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Create a preview for image and video payloads. Other MIME types get
    /// none; they render as a plain file chip.
    pub fn create(&self, mime: &str, bytes: &Bytes) -> Option<PreviewHandle> {
        if !(mime.starts_with("image/") || mime.starts_with("video/")) {
            return None;
        }
        let handle = PreviewHandle(Uuid::new_v4());
        let url = format!("data:{};base64,{}", mime, B64.encode(bytes));
        self.lock().insert(handle, url);
        Some(handle)
    }

    pub fn data_url(&self, handle: PreviewHandle) -> Option<String> {
        self.lock().get(&handle).cloned()
    }

    /// Returns false if the handle was already released.
    pub fn release(&self, handle: PreviewHandle) -> bool {
        self.lock().remove(&handle).is_some()
    }

    /// Number of previews currently held.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PreviewHandle, String>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PreviewRegistry {
    fn default() -> Self {
        Self::new()
    }
}
