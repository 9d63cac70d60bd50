//! Error types for highlight resolution and painting

use thiserror::Error;

/// Result type alias for highlight operations
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlight error type
#[derive(Error, Debug)]
pub enum HighlightError {
    /// An annotation whose range is empty or inverted
    #[error("Invalid annotation range for {id}: [{start}, {end})")]
    InvalidAnnotationRange {
        id: String,
        start: usize,
        end: usize,
    },

    /// Chapter markup could not be parsed into a tree
    #[error("Markup parse error at byte {position}: {message}")]
    MarkupParse { position: usize, message: String },

    /// Color that is not a 6-hex-digit RGB value
    #[error("Invalid highlight color: {0}")]
    InvalidColor(String),

    /// Content provider failure
    #[error("Content error: {0}")]
    Content(#[source] anyhow::Error),

    /// Annotation store failure
    #[error("Annotation store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl HighlightError {
    /// Whether the caller should fall back to the unpainted content
    pub fn is_markup_parse(&self) -> bool {
        matches!(self, HighlightError::MarkupParse { .. })
    }
}
