//! Los Libros Highlights
//!
//! Highlight rendering for the Los Libros reader. Annotations are character
//! ranges over a chapter's flattened text; this crate resolves overlapping
//! annotations into disjoint spans and paints them into plain text or XHTML
//! chapter markup as inert `<span>` markers the reading UI can hook into.
//!
//! # Modules
//!
//! - `annotations`: annotation model and the store seam
//! - `content`: content provider seam
//! - `highlight`: range resolver and content painters
//! - `render`: orchestration, markup fallback and render cache
//! - `config`: marker and cache settings

pub mod annotations;
pub mod config;
pub mod content;
pub mod error;
pub mod highlight;
pub mod render;

pub use annotations::{Annotation, AnnotationStore, ContentFormat, HighlightColor};
pub use config::HighlightConfig;
pub use content::ContentProvider;
pub use error::{HighlightError, Result};
pub use highlight::{paint_markup, paint_text, resolve, HighlightSpan, PaintResult};
pub use render::{paint, HighlightRenderer, RenderedContent};
