//! Annotation types consumed by the highlight engine
//!
//! Offsets are positions in the flattened text stream of a chapter: the
//! visible characters with all markup removed, in document order, counted
//! in Unicode scalar values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HighlightError;

/// A user highlight bound to a character range of a book's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Unique identifier (UUID)
    pub id: String,
    /// The book the offsets are relative to
    pub book_id: String,
    /// First highlighted character
    pub start_offset: usize,
    /// One past the last highlighted character
    pub end_offset: usize,
    /// Highlight color
    pub color: HighlightColor,
    /// Creation timestamp, used for overlap color precedence
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
    /// Text selected at creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
    /// User note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Format of a chapter's raw content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Plain text, painted by escaping and wrapping
    PlainText,
    /// XHTML/HTML chapter markup
    Markup,
}

/// RGB highlight color, written as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HighlightColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HighlightColor {
    pub const YELLOW: HighlightColor = HighlightColor::new(0xff, 0xeb, 0x3b);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS `rgba()` value with the given alpha
    pub fn to_rgba(&self, alpha: f32) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
    }
}

impl Default for HighlightColor {
    fn default() -> Self {
        Self::YELLOW
    }
}

impl FromStr for HighlightColor {
    type Err = HighlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HighlightError::InvalidColor(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| HighlightError::InvalidColor(s.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for HighlightColor {
    type Error = HighlightError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HighlightColor> for String {
    fn from(color: HighlightColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Annotation {
    /// Create a new highlight over `[start, end)`
    pub fn new_highlight(book_id: &str, start: usize, end: usize, color: HighlightColor) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            start_offset: start,
            end_offset: end,
            color,
            created_at: now,
            updated_at: now,
            selected_text: None,
            note: None,
            tags: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    pub fn with_selected_text(mut self, text: &str) -> Self {
        self.selected_text = Some(text.to_string());
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the stored selection against the current flattened text.
    ///
    /// Returns true when no selection was stored. A mismatch means the
    /// content changed since the annotation was created.
    pub fn matches_text(&self, flattened: &str) -> bool {
        let Some(expected) = self.selected_text.as_deref() else {
            return true;
        };
        let actual: String = flattened
            .chars()
            .skip(self.start_offset)
            .take(self.len())
            .collect();
        actual == expected
    }
}
