//! Annotation persistence seam
//!
//! The highlight engine only reads annotations. Storage itself belongs to the
//! surrounding service; this trait is the interface it has to provide.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::types::Annotation;

/// Repository for annotation persistence
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Get a single annotation by id
    async fn get(&self, id: &str) -> Result<Option<Annotation>>;

    /// List annotations for a book, ordered by start offset
    async fn list_for_book(&self, book_id: &str) -> Result<Vec<Annotation>>;

    /// Insert a new annotation
    async fn create(&self, annotation: Annotation) -> Result<Annotation>;

    /// Replace an existing annotation
    async fn update(&self, annotation: Annotation) -> Result<Annotation>;

    /// Delete an annotation, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// In-memory annotation store
#[derive(Clone, Default)]
pub struct InMemoryAnnotationStore {
    annotations: Arc<RwLock<HashMap<String, Annotation>>>,
}

impl InMemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnnotationStore for InMemoryAnnotationStore {
    async fn get(&self, id: &str) -> Result<Option<Annotation>> {
        Ok(self.annotations.read().await.get(id).cloned())
    }

    async fn list_for_book(&self, book_id: &str) -> Result<Vec<Annotation>> {
        let annotations = self.annotations.read().await;
        let mut list: Vec<Annotation> = annotations
            .values()
            .filter(|a| a.book_id == book_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            (a.start_offset, a.end_offset, &a.id).cmp(&(b.start_offset, b.end_offset, &b.id))
        });
        Ok(list)
    }

    async fn create(&self, annotation: Annotation) -> Result<Annotation> {
        let mut annotations = self.annotations.write().await;
        if annotations.contains_key(&annotation.id) {
            bail!("Annotation already exists: {}", annotation.id);
        }
        annotations.insert(annotation.id.clone(), annotation.clone());
        Ok(annotation)
    }

    async fn update(&self, mut annotation: Annotation) -> Result<Annotation> {
        let mut annotations = self.annotations.write().await;
        let Some(existing) = annotations.get_mut(&annotation.id) else {
            bail!("Annotation not found: {}", annotation.id);
        };
        annotation.updated_at = Utc::now();
        *existing = annotation.clone();
        Ok(annotation)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.annotations.write().await.remove(id).is_some())
    }
}
