//! Plain-text painting
//!
//! Escapes the text for HTML display and wraps every span in a marker, in a
//! single left-to-right pass.

use html_escape::encode_text_to_string;

use super::marker::{close_tag, open_tag};
use super::resolver::{clip_spans, HighlightSpan};
use super::PaintResult;
use crate::config::HighlightConfig;

/// Paint `content` with `spans`, producing escaped HTML.
///
/// Removing the markers and unescaping the output reproduces `content`.
/// Spans past the end of `content` are clipped or skipped and their
/// annotations reported as stale.
pub fn paint_text(content: &str, spans: &[HighlightSpan], config: &HighlightConfig) -> PaintResult {
    let char_count = content.chars().count();
    let (spans, stale_annotations) = clip_spans(spans, char_count);
    if !stale_annotations.is_empty() {
        tracing::debug!(
            "Clipped {} stale annotations to {} characters",
            stale_annotations.len(),
            char_count
        );
    }

    let mut output = String::with_capacity(content.len() + spans.len() * 128);
    let mut cursor = CharCursor::new(content);

    for span in &spans {
        encode_text_to_string(cursor.take_until(span.start), &mut output);
        output.push_str(&open_tag(span, config));
        encode_text_to_string(cursor.take_until(span.end), &mut output);
        output.push_str(&close_tag(config));
    }
    encode_text_to_string(cursor.rest(), &mut output);

    PaintResult {
        content: output,
        painted_spans: spans.len(),
        stale_annotations,
    }
}

/// Walks a string by character offset without re-scanning from the start
struct CharCursor<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
        }
    }

    /// Slice from the cursor up to character offset `target`
    fn take_until(&mut self, target: usize) -> &'a str {
        let from = self.byte;
        let remaining = &self.text[from..];
        let step = target.saturating_sub(self.chars);
        let len = remaining
            .char_indices()
            .nth(step)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        self.byte += len;
        self.chars += step;
        &self.text[from..self.byte]
    }

    fn rest(&mut self) -> &'a str {
        let from = self.byte;
        self.byte = self.text.len();
        &self.text[from..]
    }
}
