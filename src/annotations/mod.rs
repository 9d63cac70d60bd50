//! Annotation module
//!
//! Read-only annotation model for the highlight engine and the store seam
//! the surrounding service implements.

mod store;
mod types;

pub use store::{AnnotationStore, InMemoryAnnotationStore};
pub use types::{Annotation, ContentFormat, HighlightColor};
