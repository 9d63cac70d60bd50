//! Highlight engine
//!
//! Resolves overlapping annotations into disjoint spans and paints them
//! into chapter content:
//! - `resolver`: sweep over annotation boundaries, color precedence
//! - `text`: plain-text painting (escape and wrap)
//! - `markup`: XHTML painting (parse, split text leaves, serialize)
//!
//! Everything here is synchronous and free of shared state.

mod marker;
mod markup;
mod resolver;
mod text;

use serde::Serialize;

pub use markup::{flatten_markup, paint_markup, strip_markers};
pub use resolver::{clip_spans, resolve, HighlightSpan};
pub use text::paint_text;

/// Result of painting highlights into content
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintResult {
    /// The painted content
    pub content: String,
    /// Number of spans that were painted
    pub painted_spans: usize,
    /// Annotations whose offsets fall outside this content
    pub stale_annotations: Vec<String>,
}
