//! Markup painting
//!
//! Chapter markup is parsed into an owned tree with quick-xml. Text leaves
//! are indexed by their position in the flattened text stream, leaves that
//! intersect a span are split and the covered piece wrapped in a marker, and
//! the tree is written back out. Tags, attributes, comments and text outside
//! the covered pieces are emitted exactly as they were read.

use std::ops::Range;

use html_escape::decode_html_entities;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::marker::{close_tag, open_tag};
use super::resolver::{clip_spans, HighlightSpan};
use super::PaintResult;
use crate::config::HighlightConfig;
use crate::error::{HighlightError, Result};

/// Elements whose text is never rendered in the page body
const HIDDEN_ELEMENTS: [&str; 4] = ["head", "title", "script", "style"];

/// HTML elements that never have content and may omit the self-closing slash
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const BOM: char = '\u{feff}';

/// Longest entity reference considered when scanning text
const MAX_REFERENCE_LEN: usize = 32;

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(TextLeaf),
    /// Comments, processing instructions, declarations and doctypes
    Raw(String),
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    start_tag: String,
    /// `None` for self-closing elements
    end_tag: Option<String>,
    attributes: Vec<String>,
    children: Vec<Node>,
}

/// Character data of a text node or CDATA section
#[derive(Debug, Clone)]
struct TextLeaf {
    /// Raw source text; for CDATA the section content without delimiters
    raw: String,
    cdata: bool,
}

/// A local character range of one leaf covered by one span
struct Cut<'s> {
    start: usize,
    end: usize,
    span: &'s HighlightSpan,
}

impl Element {
    fn open(start: &BytesStart<'_>, raw: &str, position: usize) -> Result<Self> {
        let mut attributes = Vec::new();
        for attribute in start.html_attributes() {
            let attribute = attribute.map_err(|e| parse_error(position, e))?;
            attributes.push(String::from_utf8_lossy(attribute.key.as_ref()).into_owned());
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            start_tag: raw.to_string(),
            end_tag: None,
            attributes,
            children: Vec::new(),
        })
    }

    fn marker(span: &HighlightSpan, text: TextLeaf, config: &HighlightConfig) -> Self {
        Self {
            name: config.marker_element.clone(),
            start_tag: open_tag(span, config),
            end_tag: Some(close_tag(config)),
            attributes: vec![
                "class".to_string(),
                config.id_attribute.clone(),
                config.ids_attribute.clone(),
                "style".to_string(),
            ],
            children: vec![Node::Text(text)],
        }
    }

    fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    fn is_hidden(&self) -> bool {
        HIDDEN_ELEMENTS
            .iter()
            .any(|hidden| self.local_name().eq_ignore_ascii_case(hidden))
    }

    fn is_void(&self) -> bool {
        is_void_name(&self.name)
    }

    fn is_marker(&self, config: &HighlightConfig) -> bool {
        self.name == config.marker_element
            && self.attributes.iter().any(|a| *a == config.id_attribute)
    }
}

impl TextLeaf {
    fn slice(&self, range: Range<usize>) -> TextLeaf {
        TextLeaf {
            raw: self.raw[range].to_string(),
            cdata: self.cdata,
        }
    }

    /// Decoded text and unit boundaries as `(byte offset, char offset)`.
    ///
    /// A unit is one character or one whole character/entity reference, so
    /// splitting at a boundary never cuts a reference in half.
    fn scan(&self) -> (String, Vec<(usize, usize)>) {
        let mut decoded = String::with_capacity(self.raw.len());
        let mut boundaries = vec![(0, 0)];
        let mut byte = 0;
        let mut chars = 0;

        while byte < self.raw.len() {
            let rest = &self.raw[byte..];
            let (len, text) = match self.reference_at(rest) {
                Some((len, text)) => (len, text),
                None => {
                    let ch = rest.chars().next().unwrap_or_default();
                    (ch.len_utf8(), ch.to_string())
                }
            };
            byte += len;
            chars += text.chars().count();
            decoded.push_str(&text);
            boundaries.push((byte, chars));
        }

        (decoded, boundaries)
    }

    /// Length and decoded text of a reference at the start of `rest`
    fn reference_at(&self, rest: &str) -> Option<(usize, String)> {
        if self.cdata || !rest.starts_with('&') {
            return None;
        }
        let semi = rest.char_indices().take(MAX_REFERENCE_LEN).find(|&(_, c)| c == ';')?.0;
        let name = &rest[1..semi];
        let valid = match name.strip_prefix('#') {
            Some(number) => match number.strip_prefix(['x', 'X']) {
                Some(hex) => !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()),
                None => !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()),
            },
            None => !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric()),
        };
        if !valid {
            return None;
        }

        let reference = &rest[..=semi];
        let text = decode_html_entities(reference);
        // unknown names are shown literally
        (text != reference).then(|| (reference.len(), text.into_owned()))
    }

    fn char_len(&self) -> usize {
        self.scan().1.last().map(|&(_, chars)| chars).unwrap_or(0)
    }

    /// Replace this leaf with its pieces, wrapping each cut in a marker
    fn split(self, cuts: &[Cut<'_>], config: &HighlightConfig) -> Vec<Node> {
        let (_, boundaries) = self.scan();
        let byte_at = |chars: usize| {
            let i = boundaries.partition_point(|&(_, c)| c <= chars);
            boundaries[i.saturating_sub(1)].0
        };

        let mut pieces = Vec::with_capacity(cuts.len() * 2 + 1);
        let mut position = 0;
        for cut in cuts {
            let from = byte_at(cut.start);
            let to = byte_at(cut.end);
            if to <= from {
                continue;
            }
            if from > position {
                pieces.push(Node::Text(self.slice(position..from)));
            }
            let inside = self.slice(from..to);
            pieces.push(Node::Element(Element::marker(cut.span, inside, config)));
            position = to;
        }
        if position < self.raw.len() {
            pieces.push(Node::Text(self.slice(position..self.raw.len())));
        }

        pieces
    }
}

fn is_void_name(name: &str) -> bool {
    let local = name.rsplit(':').next().unwrap_or(name);
    VOID_ELEMENTS
        .iter()
        .any(|void| local.eq_ignore_ascii_case(void))
}

fn parse_error(position: usize, message: impl ToString) -> HighlightError {
    HighlightError::MarkupParse {
        position,
        message: message.to_string(),
    }
}

/// Parsed chapter markup
#[derive(Debug, Clone)]
struct MarkupTree {
    nodes: Vec<Node>,
}

impl MarkupTree {
    fn parse(markup: &str) -> Result<Self> {
        // Reader positions are taken relative to the text after a byte order mark
        let body = markup.strip_prefix(BOM).unwrap_or(markup);
        let base = markup.len() - body.len();

        let mut reader = Reader::from_str(body);
        reader.trim_text(false);
        // End tags are matched against the stack below so void elements can stay open
        reader.check_end_names(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut nodes = Vec::new();
        if base > 0 {
            nodes.push(Node::Raw(markup[..base].to_string()));
        }

        loop {
            let before = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| parse_error(base + reader.buffer_position(), e))?;
            let after = reader.buffer_position();
            // The reader may already have consumed the `<` while reading text
            let tag_start = if body.as_bytes().get(before) == Some(&b'<') {
                before
            } else {
                before.saturating_sub(1)
            };
            let raw = body.get(tag_start..after).unwrap_or_default();
            let position = base + tag_start;

            let node = match event {
                Event::Start(start) => {
                    let element = Element::open(&start, raw, position)?;
                    if element.is_void() {
                        Node::Element(element)
                    } else {
                        stack.push(element);
                        continue;
                    }
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    let siblings = match stack.last_mut() {
                        Some(parent) => &mut parent.children,
                        None => &mut nodes,
                    };
                    // `<img ...></img>`: the void element was already closed on open
                    if let Some(Node::Element(previous)) = siblings.last_mut() {
                        if previous.end_tag.is_none() && previous.is_void() && previous.name == name {
                            previous.end_tag = Some(raw.to_string());
                            continue;
                        }
                    }

                    let mut element = stack
                        .pop()
                        .ok_or_else(|| parse_error(position, format!("unexpected </{}>", name)))?;
                    if element.name != name {
                        return Err(parse_error(
                            position,
                            format!("expected </{}>, found </{}>", element.name, name),
                        ));
                    }
                    element.end_tag = Some(raw.to_string());
                    Node::Element(element)
                }
                Event::Empty(start) => Node::Element(Element::open(&start, raw, position)?),
                Event::Text(text) => Node::Text(TextLeaf {
                    raw: String::from_utf8_lossy(&text).into_owned(),
                    cdata: false,
                }),
                Event::CData(cdata) => Node::Text(TextLeaf {
                    raw: String::from_utf8_lossy(&cdata).into_owned(),
                    cdata: true,
                }),
                Event::Eof => break,
                _ => Node::Raw(raw.to_string()),
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.last() {
            return Err(parse_error(markup.len(), format!("unclosed <{}>", open.name)));
        }

        Ok(Self { nodes })
    }

    /// Remove markers from an earlier paint and re-join the text they split
    fn unwrap_markers(&mut self, config: &HighlightConfig) {
        self.nodes = unwrap_nodes(std::mem::take(&mut self.nodes), config);
    }

    /// Flattened `[start, end)` range of every visible, non-empty text leaf
    fn text_index(&self) -> Vec<Range<usize>> {
        let mut index = Vec::new();
        let mut offset = 0;
        visit_leaves(&self.nodes, false, &mut |leaf| {
            let len = leaf.char_len();
            if len > 0 {
                index.push(offset..offset + len);
                offset += len;
            }
        });
        index
    }

    fn flatten(&self) -> String {
        let mut text = String::new();
        visit_leaves(&self.nodes, false, &mut |leaf| text.push_str(&leaf.scan().0));
        text
    }

    fn serialize(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.nodes, &mut out);
        out
    }
}

fn unwrap_nodes(nodes: Vec<Node>, config: &HighlightConfig) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(mut element) => {
                let children = unwrap_nodes(std::mem::take(&mut element.children), config);
                if element.is_marker(config) {
                    for child in children {
                        push_joined(&mut out, child);
                    }
                } else {
                    element.children = children;
                    out.push(Node::Element(element));
                }
            }
            other => push_joined(&mut out, other),
        }
    }
    out
}

fn push_joined(out: &mut Vec<Node>, node: Node) {
    if let (Some(Node::Text(prev)), Node::Text(next)) = (out.last_mut(), &node) {
        if prev.cdata == next.cdata {
            prev.raw.push_str(&next.raw);
            return;
        }
    }
    out.push(node);
}

fn visit_leaves(nodes: &[Node], hidden: bool, f: &mut impl FnMut(&TextLeaf)) {
    for node in nodes {
        match node {
            Node::Element(element) => {
                visit_leaves(&element.children, hidden || element.is_hidden(), f)
            }
            Node::Text(leaf) if !hidden => f(leaf),
            _ => {}
        }
    }
}

/// Split and wrap leaves in document order, taking one plan per indexed leaf
fn apply_cuts<'s, I>(nodes: &mut Vec<Node>, hidden: bool, plans: &mut I, config: &HighlightConfig)
where
    I: Iterator<Item = Vec<Cut<'s>>>,
{
    for node in std::mem::take(nodes) {
        match node {
            Node::Element(mut element) => {
                let hidden = hidden || element.is_hidden();
                apply_cuts(&mut element.children, hidden, plans, config);
                nodes.push(Node::Element(element));
            }
            Node::Text(leaf) if !hidden && leaf.char_len() > 0 => {
                let cuts = plans.next().unwrap_or_default();
                if cuts.is_empty() {
                    nodes.push(Node::Text(leaf));
                } else {
                    nodes.extend(leaf.split(&cuts, config));
                }
            }
            other => nodes.push(other),
        }
    }
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(element) => {
                out.push_str(&element.start_tag);
                write_nodes(&element.children, out);
                if let Some(end_tag) = &element.end_tag {
                    out.push_str(end_tag);
                }
            }
            Node::Text(leaf) if leaf.cdata => {
                out.push_str("<![CDATA[");
                out.push_str(&leaf.raw);
                out.push_str("]]>");
            }
            Node::Text(leaf) => out.push_str(&leaf.raw),
            Node::Raw(raw) => out.push_str(raw),
        }
    }
}

/// Paint chapter markup with `spans`.
///
/// Span offsets are positions in the flattened text stream. Markers left by
/// an earlier paint are removed first, so re-painting painted output gives
/// the same result as painting the original. Fails with
/// [`HighlightError::MarkupParse`] when the markup is not well-formed; the
/// caller should then display the markup unpainted.
pub fn paint_markup(
    markup: &str,
    spans: &[HighlightSpan],
    config: &HighlightConfig,
) -> Result<PaintResult> {
    let mut tree = MarkupTree::parse(markup)?;
    tree.unwrap_markers(config);

    let index = tree.text_index();
    let total = index.last().map(|r| r.end).unwrap_or(0);
    let (spans, stale_annotations) = clip_spans(spans, total);
    if !stale_annotations.is_empty() {
        tracing::debug!(
            "Clipped {} stale annotations to {} characters",
            stale_annotations.len(),
            total
        );
    }

    // Latest span first; each leaf ends up with its cuts in descending order
    let mut plans: Vec<Vec<Cut<'_>>> = (0..index.len()).map(|_| Vec::new()).collect();
    for span in spans.iter().rev() {
        let first = index.partition_point(|leaf| leaf.end <= span.start);
        for (i, leaf) in index.iter().enumerate().skip(first) {
            if leaf.start >= span.end {
                break;
            }
            plans[i].push(Cut {
                start: span.start.max(leaf.start) - leaf.start,
                end: span.end.min(leaf.end) - leaf.start,
                span,
            });
        }
    }
    for cuts in &mut plans {
        cuts.reverse();
    }

    let mut plans = plans.into_iter();
    apply_cuts(&mut tree.nodes, false, &mut plans, config);

    Ok(PaintResult {
        content: tree.serialize(),
        painted_spans: spans.len(),
        stale_annotations,
    })
}

/// Flattened text stream of `markup`: visible characters in document order
pub fn flatten_markup(markup: &str) -> Result<String> {
    Ok(MarkupTree::parse(markup)?.flatten())
}

/// Remove highlight markers from painted markup
pub fn strip_markers(markup: &str, config: &HighlightConfig) -> Result<String> {
    let mut tree = MarkupTree::parse(markup)?;
    tree.unwrap_markers(config);
    Ok(tree.serialize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, HighlightColor};
    use crate::highlight::resolve;

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter 1</title><style>p { margin: 0; }</style></head>
<body>
  <h1 id="c1">Chapter <em>One</em></h1>
  <!-- opening -->
  <p class="first">It was a <b>bright</b> cold day in April, &amp; the clocks were striking thirteen.</p>
  <p>Winston Smith<br/>slipped quickly through the <i>glass <b>doors</b></i> of Victory Mansions.</p>
  <img src="images/map.png" alt="Map"/>
  <p><![CDATA[Raw <data> & stuff]]> after</p>
</body>
</html>"#;

    /// HTML-flavoured chapter: void elements without slashes, a stylesheet
    /// instruction and references that decode to more than one character
    const HTML_CHAPTER: &str = r#"<?xml version="1.0"?>
<?xml-stylesheet type="text/css" href="style.css"?>
<html>
<head><meta charset="utf-8"><title>Notes</title><link rel="stylesheet" href="a.css"></head>
<body>
  <p>First line<br>second line &NotEqualTilde; after</p>
  <hr>
  <p>Figure <img src="f.png" alt="f"></img> and &fjlig;ord &amp; more</p>
</body>
</html>"#;

    fn span(start: usize, end: usize, ids: &[&str]) -> HighlightSpan {
        HighlightSpan {
            start,
            end,
            annotation_ids: ids.iter().map(|s| s.to_string()).collect(),
            primary_id: ids[0].to_string(),
            color: HighlightColor::YELLOW,
        }
    }

    fn marker(id: &str) -> String {
        format!(
            "<span class=\"ll-highlight\" data-annotation-id=\"{id}\" data-annotation-ids=\"{id}\" \
             style=\"background-color: rgba(255, 235, 59, 0.3);\">"
        )
    }

    #[test]
    fn test_span_across_bold_boundary() {
        let markup = "<p>Hello <b>world</b></p>";
        let result = paint_markup(markup, &[span(3, 8, &["a1"])], &HighlightConfig::default())
            .unwrap();

        let expected = format!(
            "<p>Hel{m}lo </span><b>{m}wo</span>rld</b></p>",
            m = marker("a1")
        );
        assert_eq!(result.content, expected);
        assert_eq!(result.painted_spans, 1);
        assert_eq!(flatten_markup(&result.content).unwrap(), "Hello world");
    }

    #[test]
    fn test_whole_leaf_wrapped() {
        let markup = "<p><b>bold</b> tail</p>";
        let result =
            paint_markup(markup, &[span(0, 4, &["a1"])], &HighlightConfig::default()).unwrap();

        assert_eq!(
            result.content,
            format!("<p><b>{}bold</span></b> tail</p>", marker("a1"))
        );
    }

    #[test]
    fn test_multiple_spans_in_one_leaf() {
        let markup = "<p>abcdefghij</p>";
        let spans = [span(1, 3, &["x"]), span(3, 5, &["y"]), span(8, 10, &["z"])];
        let result = paint_markup(markup, &spans, &HighlightConfig::default()).unwrap();

        let expected = format!(
            "<p>a{}bc</span>{}de</span>fgh{}ij</span></p>",
            marker("x"),
            marker("y"),
            marker("z")
        );
        assert_eq!(result.content, expected);
    }

    #[test]
    fn test_entities_count_as_one_character() {
        let markup = "<p>Fish &amp; chips&#33;</p>";
        assert_eq!(flatten_markup(markup).unwrap(), "Fish & chips!");

        let result =
            paint_markup(markup, &[span(5, 6, &["a1"])], &HighlightConfig::default()).unwrap();
        assert_eq!(
            result.content,
            format!("<p>Fish {}&amp;</span> chips&#33;</p>", marker("a1"))
        );
    }

    #[test]
    fn test_html_named_entities() {
        let markup = "<p>a&nbsp;b &unknown; c</p>";
        assert_eq!(flatten_markup(markup).unwrap(), "a\u{a0}b &unknown; c");
    }

    #[test]
    fn test_cdata_split() {
        let markup = "<p><![CDATA[a<b>c]]></p>";
        assert_eq!(flatten_markup(markup).unwrap(), "a<b>c");

        let result =
            paint_markup(markup, &[span(1, 4, &["a1"])], &HighlightConfig::default()).unwrap();
        assert_eq!(
            result.content,
            format!(
                "<p><![CDATA[a]]>{}<![CDATA[<b>]]></span><![CDATA[c]]></p>",
                marker("a1")
            )
        );
        assert_eq!(flatten_markup(&result.content).unwrap(), "a<b>c");
    }

    #[test]
    fn test_script_and_style_ignored() {
        let markup = "<div><style>p{}</style><script>var x = 1;</script><p>Text</p></div>";
        assert_eq!(flatten_markup(markup).unwrap(), "Text");

        let result =
            paint_markup(markup, &[span(0, 4, &["a1"])], &HighlightConfig::default()).unwrap();
        assert!(result.content.contains("<script>var x = 1;</script>"));
        assert!(result.content.contains(&format!("<p>{}Text</span></p>", marker("a1"))));
    }

    #[test]
    fn test_untouched_markup_preserved() {
        let tree = MarkupTree::parse(CHAPTER).unwrap();
        assert_eq!(tree.serialize(), CHAPTER);

        let result = paint_markup(CHAPTER, &[], &HighlightConfig::default()).unwrap();
        assert_eq!(result.content, CHAPTER);
    }

    #[test]
    fn test_paint_chapter_preserves_structure() {
        let config = HighlightConfig::default();
        let flattened = flatten_markup(CHAPTER).unwrap();
        let len = flattened.chars().count();

        let annotations = vec![
            Annotation::new_highlight("b", 10, 40, HighlightColor::YELLOW).with_id("a"),
            Annotation::new_highlight("b", 30, 90, HighlightColor::new(0, 200, 0)).with_id("b"),
            Annotation::new_highlight("b", 85, len, HighlightColor::new(0, 0, 200)).with_id("c"),
        ];
        let spans = resolve(&annotations).unwrap();

        let result = paint_markup(CHAPTER, &spans, &config).unwrap();

        assert_eq!(result.painted_spans, spans.len());
        assert!(result.stale_annotations.is_empty());
        assert_eq!(flatten_markup(&result.content).unwrap(), flattened);
        assert_eq!(strip_markers(&result.content, &config).unwrap(), CHAPTER);
        assert!(result.content.contains("<img src=\"images/map.png\" alt=\"Map\"/>"));
        assert!(result.content.contains("<!-- opening -->"));
        assert!(result.content.contains("data-annotation-ids=\"b c\""));
    }

    #[test]
    fn test_repaint_is_stable() {
        let config = HighlightConfig::default();
        let spans = [span(5, 25, &["a1"]), span(60, 75, &["a2", "a3"])];

        let first = paint_markup(CHAPTER, &spans, &config).unwrap();
        let second = paint_markup(&first.content, &spans, &config).unwrap();
        assert_eq!(first.content, second.content);

        let moved = [span(0, 3, &["a1"])];
        let repainted = paint_markup(&first.content, &moved, &config).unwrap();
        assert_eq!(repainted.content, paint_markup(CHAPTER, &moved, &config).unwrap().content);
    }

    #[test]
    fn test_stale_spans_clipped() {
        let markup = "<p>Hello</p>";
        let result = paint_markup(
            markup,
            &[span(3, 10, &["a1"]), span(20, 30, &["a2"])],
            &HighlightConfig::default(),
        )
        .unwrap();

        assert_eq!(result.content, format!("<p>Hel{}lo</span></p>", marker("a1")));
        assert_eq!(result.stale_annotations, vec!["a1", "a2"]);
    }

    #[test]
    fn test_malformed_markup_fails() {
        let config = HighlightConfig::default();
        for markup in ["<p>unclosed <b>bold</p>", "<p>never closed", "text</p>"] {
            let err = paint_markup(markup, &[span(0, 1, &["a1"])], &config).unwrap_err();
            assert!(err.is_markup_parse(), "{} should fail to parse", markup);
        }
    }

    #[test]
    fn test_flatten_fragment_with_multiple_roots() {
        let markup = "<p>One</p>\n<p>Two</p>";
        assert_eq!(flatten_markup(markup).unwrap(), "One\nTwo");
    }

    /// Small deterministic generator so the invariant checks need no extra crates
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: usize) -> usize {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 33) % bound as u64) as usize
        }
    }

    #[test]
    fn test_byte_order_mark_preserved() {
        let config = HighlightConfig::default();
        let markup = "\u{feff}<p>bom text</p>";

        let untouched = paint_markup(markup, &[], &config).unwrap();
        assert_eq!(untouched.content, markup);
        assert_eq!(flatten_markup(markup).unwrap(), "bom text");

        let painted = paint_markup(markup, &[span(0, 3, &["a1"])], &config).unwrap();
        assert_eq!(
            painted.content,
            format!("{}<p>{}bom</span> text</p>", BOM, marker("a1"))
        );
        assert_eq!(strip_markers(&painted.content, &config).unwrap(), markup);
    }

    #[test]
    fn test_byte_order_mark_error_position() {
        let err = paint_markup("\u{feff}text</p>", &[], &HighlightConfig::default()).unwrap_err();
        match err {
            HighlightError::MarkupParse { position, .. } => assert_eq!(position, 7),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_head_text_not_painted() {
        let markup = "<html><head><title>Title</title></head><body><p>Body</p></body></html>";
        assert_eq!(flatten_markup(markup).unwrap(), "Body");

        let result =
            paint_markup(markup, &[span(0, 4, &["a1"])], &HighlightConfig::default()).unwrap();
        assert_eq!(
            result.content,
            format!(
                "<html><head><title>Title</title></head><body><p>{}Body</span></p></body></html>",
                marker("a1")
            )
        );
    }

    #[test]
    fn test_void_elements_without_slash() {
        let config = HighlightConfig::default();
        let markup = "<p>line<br>break<img src=\"a.png\" alt=a></p>";
        assert_eq!(flatten_markup(markup).unwrap(), "linebreak");

        let result = paint_markup(markup, &[span(2, 6, &["a1"])], &config).unwrap();
        assert_eq!(
            result.content,
            format!(
                "<p>li{m}ne</span><br>{m}br</span>eak<img src=\"a.png\" alt=a></p>",
                m = marker("a1")
            )
        );
        assert_eq!(strip_markers(&result.content, &config).unwrap(), markup);
    }

    #[test]
    fn test_void_element_with_end_tag() {
        let markup = "<p>a<img src=\"x.png\"></img>b<br></br>c</p>";
        assert_eq!(flatten_markup(markup).unwrap(), "abc");
        assert_eq!(
            paint_markup(markup, &[], &HighlightConfig::default()).unwrap().content,
            markup
        );
    }

    #[test]
    fn test_cut_inside_multi_character_reference() {
        let config = HighlightConfig::default();
        let markup = "<p>x&NotEqualTilde;y</p>";
        let flattened = flatten_markup(markup).unwrap();
        let len = flattened.chars().count();

        for start in 0..len {
            for end in start + 1..=len {
                let result = paint_markup(markup, &[span(start, end, &["a1"])], &config).unwrap();
                assert_eq!(flatten_markup(&result.content).unwrap(), flattened);
                assert_eq!(strip_markers(&result.content, &config).unwrap(), markup);
                assert!(!result.content.contains("&NotEqual</span>"));
            }
        }
    }

    #[test]
    fn test_structure_preserved_on_generated_spans() {
        let with_bom = format!("\u{feff}{}", CHAPTER);
        for chapter in [CHAPTER, HTML_CHAPTER, with_bom.as_str()] {
            check_generated_spans(chapter);
        }
    }

    fn check_generated_spans(chapter: &str) {
        let config = HighlightConfig::default();
        let flattened = flatten_markup(chapter).unwrap();
        let len = flattened.chars().count();
        let mut rng = Lcg(7);

        assert_eq!(paint_markup(chapter, &[], &config).unwrap().content, chapter);

        for round in 0..100 {
            let annotations: Vec<Annotation> = (0..rng.next(8))
                .map(|i| {
                    let start = rng.next(len);
                    let end = (start + 1 + rng.next(40)).min(len + 5);
                    Annotation::new_highlight("b", start, end, HighlightColor::YELLOW)
                        .with_id(&format!("r{}-{}", round, i))
                })
                .collect();
            let spans = resolve(&annotations).unwrap();

            let result = paint_markup(chapter, &spans, &config).unwrap();

            assert_eq!(flatten_markup(&result.content).unwrap(), flattened);
            assert_eq!(strip_markers(&result.content, &config).unwrap(), chapter);
            let repainted = paint_markup(&result.content, &spans, &config).unwrap();
            assert_eq!(repainted.content, result.content);
        }
    }
}
