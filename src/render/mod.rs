//! Chapter rendering
//!
//! Glues the highlight engine to its collaborators: fetches content and
//! annotations, paints, and falls back to unpainted markup when the chapter
//! cannot be parsed. Annotations are a visual enhancement and must never
//! stop a book from being displayed.

mod cache;

use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;

pub use cache::{fingerprint, RenderCache, RenderCacheKey};

use crate::annotations::{Annotation, AnnotationStore, ContentFormat};
use crate::config::HighlightConfig;
use crate::content::ContentProvider;
use crate::error::{HighlightError, Result};
use crate::highlight::{paint_markup, paint_text, resolve, PaintResult};

/// Content ready for the reading surface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedContent {
    pub content: String,
    pub format: ContentFormat,
    pub painted_spans: usize,
    /// Annotations whose offsets no longer fit the content
    pub stale_annotations: Vec<String>,
    /// The markup could not be parsed and is returned unpainted
    pub fallback: bool,
}

impl RenderedContent {
    fn painted(result: PaintResult, format: ContentFormat) -> Self {
        Self {
            content: result.content,
            format,
            painted_spans: result.painted_spans,
            stale_annotations: result.stale_annotations,
            fallback: false,
        }
    }
}

/// Paint `annotations` into `content` without any collaborators.
///
/// Invalid annotation ranges fail the whole call. Unparseable markup is
/// returned as-is with `fallback` set.
pub fn paint(
    content: &str,
    format: ContentFormat,
    annotations: &[Annotation],
    config: &HighlightConfig,
) -> Result<RenderedContent> {
    let spans = resolve(annotations)?;

    match format {
        ContentFormat::PlainText => {
            let mismatched = annotations.iter().filter(|a| !a.matches_text(content)).count();
            if mismatched > 0 {
                tracing::debug!("{} annotations no longer match their selected text", mismatched);
            }
            Ok(RenderedContent::painted(paint_text(content, &spans, config), format))
        }
        ContentFormat::Markup => match paint_markup(content, &spans, config) {
            Ok(result) => Ok(RenderedContent::painted(result, format)),
            Err(e) if e.is_markup_parse() => {
                tracing::warn!("Rendering markup without highlights: {}", e);
                Ok(RenderedContent {
                    content: content.to_string(),
                    format,
                    painted_spans: 0,
                    stale_annotations: Vec::new(),
                    fallback: true,
                })
            }
            Err(e) => Err(e),
        },
    }
}

/// Renders book content with its highlights
pub struct HighlightRenderer {
    store: Arc<dyn AnnotationStore>,
    provider: Arc<dyn ContentProvider>,
    config: HighlightConfig,
    cache: Option<RenderCache>,
}

impl HighlightRenderer {
    pub fn new(
        store: Arc<dyn AnnotationStore>,
        provider: Arc<dyn ContentProvider>,
        config: HighlightConfig,
    ) -> Self {
        let cache = NonZeroUsize::new(config.cache_capacity).map(RenderCache::new);
        Self {
            store,
            provider,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    /// Fetch, resolve and paint a book's content
    pub async fn render(&self, book_id: &str, format: ContentFormat) -> Result<RenderedContent> {
        let content = self
            .provider
            .get_content(book_id, format)
            .await
            .map_err(HighlightError::Content)?;
        let annotations = self
            .store
            .list_for_book(book_id)
            .await
            .map_err(HighlightError::Store)?;

        let key = self
            .cache
            .as_ref()
            .map(|_| RenderCacheKey::new(book_id, format, &content, &annotations));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                tracing::debug!("Render cache hit for {} ({:?})", book_id, format);
                return Ok(hit);
            }
        }

        let rendered = paint(&content, format, &annotations, &self.config)?;
        tracing::debug!(
            "Painted {} spans from {} annotations for {}",
            rendered.painted_spans,
            annotations.len(),
            book_id
        );

        // Fallback output is not cached so a fixed chapter is picked up
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if !rendered.fallback {
                cache.insert(key, rendered.clone());
            }
        }

        Ok(rendered)
    }

    /// Pass an asset request through to the content provider
    pub async fn asset(&self, book_id: &str, filename: &str) -> Result<Vec<u8>> {
        self.provider
            .get_asset(book_id, filename)
            .await
            .map_err(HighlightError::Content)
    }

    /// Forget cached renderings of a book
    pub fn invalidate(&self, book_id: &str) {
        if let Some(cache) = &self.cache {
            let removed = cache.invalidate_book(book_id);
            tracing::debug!("Invalidated {} cached renderings of {}", removed, book_id);
        }
    }

    pub fn cached_renderings(&self) -> usize {
        self.cache.as_ref().map(RenderCache::len).unwrap_or(0)
    }
}
