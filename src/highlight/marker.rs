//! Marker elements wrapped around highlighted text
//!
//! Every marker carries the primary annotation id, the full list of
//! contributing ids and the alpha-blended color. UI layers resolve hover and
//! click interaction from these attributes alone.

use html_escape::encode_double_quoted_attribute;

use super::resolver::HighlightSpan;
use crate::config::HighlightConfig;

/// Opening tag of the marker for a span
pub(crate) fn open_tag(span: &HighlightSpan, config: &HighlightConfig) -> String {
    let ids = span.annotation_ids.join(" ");
    format!(
        "<{} class=\"{}\" {}=\"{}\" {}=\"{}\" style=\"background-color: {};\">",
        config.marker_element,
        encode_double_quoted_attribute(&config.marker_class(span.is_overlap())),
        config.id_attribute,
        encode_double_quoted_attribute(&span.primary_id),
        config.ids_attribute,
        encode_double_quoted_attribute(&ids),
        span.color.to_rgba(config.alpha),
    )
}

pub(crate) fn close_tag(config: &HighlightConfig) -> String {
    format!("</{}>", config.marker_element)
}
