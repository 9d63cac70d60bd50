//! Book content provider seam
//!
//! Fetching chapter text and image assets happens outside the highlight
//! engine. Implementations may hit S3, a local library or a remote server.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::annotations::ContentFormat;

/// Source of raw book content
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Raw content of a book in the requested format
    async fn get_content(&self, book_id: &str, format: ContentFormat) -> Result<String>;

    /// Raw bytes of an asset (image, stylesheet) referenced by the content
    async fn get_asset(&self, book_id: &str, filename: &str) -> Result<Vec<u8>>;
}

/// In-memory content provider
#[derive(Clone, Default)]
pub struct InMemoryContentProvider {
    content: Arc<RwLock<HashMap<(String, ContentFormat), String>>>,
    assets: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl InMemoryContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_content(&self, book_id: &str, format: ContentFormat, content: &str) {
        self.content
            .write()
            .await
            .insert((book_id.to_string(), format), content.to_string());
    }

    pub async fn insert_asset(&self, book_id: &str, filename: &str, data: Vec<u8>) {
        self.assets
            .write()
            .await
            .insert((book_id.to_string(), filename.to_string()), data);
    }
}

#[async_trait]
impl ContentProvider for InMemoryContentProvider {
    async fn get_content(&self, book_id: &str, format: ContentFormat) -> Result<String> {
        self.content
            .read()
            .await
            .get(&(book_id.to_string(), format))
            .cloned()
            .ok_or_else(|| anyhow!("No {:?} content for book {}", format, book_id))
    }

    async fn get_asset(&self, book_id: &str, filename: &str) -> Result<Vec<u8>> {
        self.assets
            .read()
            .await
            .get(&(book_id.to_string(), filename.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("Asset not found: {}/{}", book_id, filename))
    }
}
