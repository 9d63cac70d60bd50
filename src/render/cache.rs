//! Render cache for painted chapters
//!
//! Painting is cheap enough to run per render, but readers re-open the same
//! chapter far more often than they edit highlights. Entries are keyed by
//! book, format and a digest of the content and annotation set, so any
//! highlight edit or content change produces a new key.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::RenderedContent;
use crate::annotations::{Annotation, ContentFormat};

/// Cache key for painted content
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RenderCacheKey {
    pub book_id: String,
    pub format: ContentFormat,
    /// SHA-256 over the content and every painted annotation field
    pub fingerprint: String,
}

impl RenderCacheKey {
    pub fn new(
        book_id: &str,
        format: ContentFormat,
        content: &str,
        annotations: &[Annotation],
    ) -> Self {
        Self {
            book_id: book_id.to_string(),
            format,
            fingerprint: fingerprint(content, annotations),
        }
    }
}

/// Digest of content plus the annotation fields that affect painting.
/// Independent of annotation order.
pub fn fingerprint(content: &str, annotations: &[Annotation]) -> String {
    let mut sorted: Vec<&Annotation> = annotations.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.id, a.start_offset, a.end_offset, a.created_at, a.color)
            .cmp(&(&b.id, b.start_offset, b.end_offset, b.created_at, b.color))
    });

    let mut hasher = Sha256::new();
    hasher.update((content.len() as u64).to_le_bytes());
    hasher.update(content.as_bytes());
    for annotation in sorted {
        hasher.update((annotation.id.len() as u64).to_le_bytes());
        hasher.update(annotation.id.as_bytes());
        hasher.update((annotation.start_offset as u64).to_le_bytes());
        hasher.update((annotation.end_offset as u64).to_le_bytes());
        hasher.update([annotation.color.r, annotation.color.g, annotation.color.b]);
        hasher.update(annotation.created_at.timestamp_micros().to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Thread-safe LRU cache of painted content
pub struct RenderCache {
    entries: Mutex<LruCache<RenderCacheKey, RenderedContent>>,
}

impl RenderCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &RenderCacheKey) -> Option<RenderedContent> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: RenderCacheKey, value: RenderedContent) {
        self.entries.lock().put(key, value);
    }

    /// Drop every cached rendering of a book
    pub fn invalidate_book(&self, book_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let stale: Vec<RenderCacheKey> = entries
            .iter()
            .filter(|(key, _)| key.book_id == book_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
