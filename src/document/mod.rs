//! Parsed HTML document that annotations anchor into.
//!
//! Wraps a `scraper::Html` tree and adds the handful of traversal helpers the
//! anchoring code needs: visible text nodes in document order, block-level
//! ancestors, CSS selection by node id, and char-offset text ranges.

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never counts as document content.
const IGNORED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that bound a context window.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "html",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

/// A position inside a text node, counted in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl TextPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A live selection between two text positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: TextPoint,
    pub end: TextPoint,
}

impl TextRange {
    pub fn new(start: TextPoint, end: TextPoint) -> Self {
        Self { start, end }
    }
}

/// A parsed document.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a full HTML document.
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// The document node (parent of `<html>`).
    pub fn document_node(&self) -> NodeRef<'_, Node> {
        self.html.tree.root()
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.html.tree.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.node(id).and_then(ElementRef::wrap)
    }

    /// Text content of a text node, `None` for any other node kind.
    pub fn text_of(&self, id: NodeId) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.value().as_text())
            .map(|t| &**t)
    }

    /// The `<body>` element, or the root element when the document has none.
    pub fn body(&self) -> NodeId {
        self.html
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "body")
            .map(|e| e.id())
            .unwrap_or_else(|| self.html.root_element().id())
    }

    /// Visible text nodes below `id`, in document order.
    ///
    /// Text inside `script`, `style`, `noscript` and `template` is skipped.
    pub fn text_nodes_under(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(node) = self.node(id) {
            collect_text_nodes(node, &mut out);
        }
        out
    }

    /// Concatenated visible text below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.text_nodes_under(id)
            .into_iter()
            .filter_map(|n| self.text_of(n))
            .collect()
    }

    /// Nearest block-level element enclosing `id` (the node itself counts).
    pub fn block_ancestor(&self, id: NodeId) -> NodeId {
        let mut current = self.node(id);
        while let Some(node) = current {
            if let Some(el) = node.value().as_element() {
                if BLOCK_TAGS.contains(&el.name()) {
                    return node.id();
                }
            }
            current = node.parent();
        }
        self.body()
    }

    /// Evaluate a CSS selector. Selectors that fail to parse match nothing.
    pub fn select(&self, css: &str) -> Vec<NodeId> {
        match Selector::parse(css) {
            Ok(selector) => self.html.select(&selector).map(|e| e.id()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Live text of a range, or `None` if the range does not describe a valid
    /// forward selection over text nodes of this document.
    pub fn range_text(&self, range: &TextRange) -> Option<String> {
        let start_text = self.text_of(range.start.node)?;
        let end_text = self.text_of(range.end.node)?;
        if range.start.offset > char_len(start_text) || range.end.offset > char_len(end_text) {
            return None;
        }

        if range.start.node == range.end.node {
            if range.end.offset < range.start.offset {
                return None;
            }
            return Some(char_slice(start_text, range.start.offset, range.end.offset).to_string());
        }

        let nodes = self.text_nodes_under(self.document_node().id());
        let start_idx = nodes.iter().position(|n| *n == range.start.node)?;
        let end_idx = nodes.iter().position(|n| *n == range.end.node)?;
        if end_idx < start_idx {
            return None;
        }

        let mut out = String::new();
        out.push_str(char_slice(
            start_text,
            range.start.offset,
            char_len(start_text),
        ));
        for id in &nodes[start_idx + 1..end_idx] {
            out.push_str(self.text_of(*id).unwrap_or_default());
        }
        out.push_str(char_slice(end_text, 0, range.end.offset));
        Some(out)
    }

    /// Range covering the first occurrence of `needle` inside a single
    /// visible text node.
    pub fn find_text(&self, needle: &str) -> Option<TextRange> {
        if needle.is_empty() {
            return None;
        }
        self.text_nodes_under(self.document_node().id())
            .into_iter()
            .find_map(|id| {
                let text = self.text_of(id)?;
                let byte = text.find(needle)?;
                let start = text[..byte].chars().count();
                let end = start + needle.chars().count();
                Some(TextRange::new(
                    TextPoint::new(id, start),
                    TextPoint::new(id, end),
                ))
            })
    }
}

fn collect_text_nodes(node: NodeRef<'_, Node>, out: &mut Vec<NodeId>) {
    match node.value() {
        Node::Text(_) => out.push(node.id()),
        Node::Element(el) if IGNORED_TAGS.contains(&el.name()) => {}
        _ => {
            for child in node.children() {
                collect_text_nodes(child, out);
            }
        }
    }
}

/// Length of `s` in chars.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Slice `s` by char offsets, clamping to the string bounds.
pub fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let byte_at = |idx: usize| {
        s.char_indices()
            .nth(idx)
            .map(|(b, _)| b)
            .unwrap_or(s.len())
    };
    let start_byte = byte_at(start);
    let end_byte = byte_at(end.max(start));
    &s[start_byte..end_byte]
}
