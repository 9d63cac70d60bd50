//! Range resolution
//!
//! Turns a set of possibly overlapping annotations into a sorted sequence of
//! disjoint highlight spans with a sweep over start/end boundaries.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::annotations::{Annotation, HighlightColor};
use crate::error::{HighlightError, Result};

/// A disjoint range of the flattened text stream and the annotations covering it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    /// Every annotation covering `[start, end)`, in activation order
    pub annotation_ids: Vec<String>,
    /// Annotation whose color is displayed
    pub primary_id: String,
    pub color: HighlightColor,
}

impl HighlightSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// More than one annotation contributes to this span
    pub fn is_overlap(&self) -> bool {
        self.annotation_ids.len() > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BoundaryKind {
    // Closes sort first so touching ranges never share an offset
    Close,
    Open,
}

struct Boundary {
    offset: usize,
    kind: BoundaryKind,
    index: usize,
}

type Precedence<'a> = (DateTime<Utc>, &'a str, usize, usize, HighlightColor);

/// Most recently created wins, then the larger id
fn precedence(annotation: &Annotation) -> Precedence<'_> {
    (
        annotation.created_at,
        annotation.id.as_str(),
        annotation.start_offset,
        annotation.end_offset,
        annotation.color,
    )
}

/// Resolve annotations into disjoint spans sorted by `start`.
///
/// Fails with [`HighlightError::InvalidAnnotationRange`] if any annotation
/// has `start_offset >= end_offset`; no spans are returned in that case.
pub fn resolve(annotations: &[Annotation]) -> Result<Vec<HighlightSpan>> {
    if let Some(invalid) = annotations.iter().find(|a| a.start_offset >= a.end_offset) {
        return Err(HighlightError::InvalidAnnotationRange {
            id: invalid.id.clone(),
            start: invalid.start_offset,
            end: invalid.end_offset,
        });
    }

    let mut boundaries = Vec::with_capacity(annotations.len() * 2);
    for (index, annotation) in annotations.iter().enumerate() {
        boundaries.push(Boundary {
            offset: annotation.start_offset,
            kind: BoundaryKind::Open,
            index,
        });
        boundaries.push(Boundary {
            offset: annotation.end_offset,
            kind: BoundaryKind::Close,
            index,
        });
    }
    boundaries.sort_by(|a, b| {
        a.offset
            .cmp(&b.offset)
            .then(a.kind.cmp(&b.kind))
            .then_with(|| precedence(&annotations[a.index]).cmp(&precedence(&annotations[b.index])))
    });

    let mut active: Vec<usize> = Vec::new();
    let mut spans = Vec::new();
    let mut previous = 0;

    for boundary in &boundaries {
        if boundary.offset > previous {
            spans.extend(build_span(previous, boundary.offset, &active, annotations));
        }
        previous = boundary.offset;

        match boundary.kind {
            BoundaryKind::Open => active.push(boundary.index),
            BoundaryKind::Close => {
                if let Some(pos) = active.iter().position(|&i| i == boundary.index) {
                    active.remove(pos);
                }
            }
        }
    }

    Ok(spans)
}

/// Span for `[start, end)`, or `None` when nothing is active
fn build_span(
    start: usize,
    end: usize,
    active: &[usize],
    annotations: &[Annotation],
) -> Option<HighlightSpan> {
    let winner = active
        .iter()
        .map(|&i| &annotations[i])
        .max_by(|a, b| precedence(a).cmp(&precedence(b)))?;

    Some(HighlightSpan {
        start,
        end,
        annotation_ids: active.iter().map(|&i| annotations[i].id.clone()).collect(),
        primary_id: winner.id.clone(),
        color: winner.color,
    })
}

/// Clip spans to a flattened stream of `len` characters.
///
/// Spans starting at or past `len` are dropped, spans crossing it are cut
/// short. Returns the surviving spans and the ids of annotations that were
/// affected, since their offsets no longer match this content.
pub fn clip_spans(spans: &[HighlightSpan], len: usize) -> (Vec<HighlightSpan>, Vec<String>) {
    let mut clipped = Vec::with_capacity(spans.len());
    let mut stale: Vec<String> = Vec::new();

    for span in spans {
        match span.end.cmp(&len) {
            Ordering::Less | Ordering::Equal => clipped.push(span.clone()),
            Ordering::Greater => {
                for id in &span.annotation_ids {
                    if !stale.contains(id) {
                        stale.push(id.clone());
                    }
                }
                if span.start < len {
                    clipped.push(HighlightSpan {
                        end: len,
                        ..span.clone()
                    });
                }
            }
        }
    }

    (clipped, stale)
}
