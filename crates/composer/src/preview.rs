use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::attachment::AttachmentFile;

/// Scheme prefix for preview URLs minted by [`MemoryPreviewStore`].
pub const PREVIEW_URL_PREFIX: &str = "blob:zova/";

/// URL-like reference into a staged file's bytes, used only for thumbnails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Table of live preview URLs.
///
/// `revoke` returns false when the URL is unknown or was already revoked.
pub trait PreviewStore: Send + Sync {
    fn create(&self, file: &AttachmentFile) -> PreviewUrl;
    fn revoke(&self, url: &PreviewUrl) -> bool;
}

/// Owner of exactly one preview URL; revokes it when dropped.
///
/// Handles are not clonable, so each URL is released once.
pub struct PreviewHandle {
    url: PreviewUrl,
    store: Arc<dyn PreviewStore>,
}

impl PreviewHandle {
    pub fn allocate(store: &Arc<dyn PreviewStore>, file: &AttachmentFile) -> Self {
        Self {
            url: store.create(file),
            store: Arc::clone(store),
        }
    }

    pub fn url(&self) -> &PreviewUrl {
        &self.url
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("PreviewHandle")
            .field(&self.url)
            .finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if !self.store.revoke(&self.url) {
            tracing::warn!(url = %self.url, "preview handle released twice or never registered");
        }
    }
}

/// In-process object-URL table backing thumbnails.
#[derive(Default)]
pub struct MemoryPreviewStore {
    live: Mutex<HashMap<PreviewUrl, Arc<[u8]>>>,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes behind a live URL, or `None` once it has been revoked.
    pub fn resolve(&self, url: &PreviewUrl) -> Option<Arc<[u8]>> {
        self.entries().get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PreviewUrl, Arc<[u8]>>> {
        // The table is plain data; a panic mid-insert leaves it usable.
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreviewStore for MemoryPreviewStore {
    fn create(&self, file: &AttachmentFile) -> PreviewUrl {
        let url = PreviewUrl::new(format!("{PREVIEW_URL_PREFIX}{}", Uuid::now_v7()));
        self.entries().insert(url.clone(), Arc::clone(file.bytes()));
        tracing::trace!(%url, name = file.name(), "created preview url");
        url
    }

    fn revoke(&self, url: &PreviewUrl) -> bool {
        let removed = self.entries().remove(url).is_some();
        if removed {
            tracing::trace!(%url, "revoked preview url");
        }
        removed
    }
}
