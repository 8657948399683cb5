//! Structural paths: tag-indexed, XPath-like addresses from the document root.
//!
//! `/html[1]/body[1]/div[2]/p[3]` names the third `<p>` child of the second
//! `<div>` in the body; a trailing `text()[n]` selects the n-th text child of
//! that element. Indices are 1-based and count only siblings of the same kind.
//! Paths are content-blind: unrelated edits elsewhere leave them valid, while
//! inserting a same-tag sibling before the target shifts them.

use ego_tree::{NodeId, NodeRef};
use scraper::Node;

use crate::document::Document;

const TEXT_STEP: &str = "text()";

/// Structural path of an element or text node.
///
/// Returns `None` for nodes that have no path (document, doctype, comments).
pub fn address_of(doc: &Document, id: NodeId) -> Option<String> {
    let node = doc.node(id)?;
    match node.value() {
        Node::Element(el) => {
            let parent = node.parent()?;
            let index = 1 + node
                .prev_siblings()
                .filter(|s| s.value().as_element().is_some_and(|e| e.name() == el.name()))
                .count();
            let prefix = if parent.value().is_document() {
                String::new()
            } else {
                address_of(doc, parent.id())?
            };
            Some(format!("{prefix}/{}[{index}]", el.name()))
        }
        Node::Text(_) => {
            let parent = node.parent()?;
            if !parent.value().is_element() {
                return None;
            }
            let index = 1 + node.prev_siblings().filter(|s| s.value().is_text()).count();
            Some(format!("{}/{TEXT_STEP}[{index}]", address_of(doc, parent.id())?))
        }
        _ => None,
    }
}

/// Resolve a structural path back to a node. Any miss yields `None`.
pub fn resolve(doc: &Document, path: &str) -> Option<NodeId> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return None;
    }

    let mut current = doc.document_node();
    let mut steps = rest.split('/').peekable();
    while let Some(step) = steps.next() {
        let (name, index) = parse_step(step)?;
        if name == TEXT_STEP {
            // A text step must be the last one.
            if steps.peek().is_some() {
                return None;
            }
            return nth_child(current, index, |n| n.value().is_text());
        }
        current = doc.node(nth_child(current, index, |n| {
            n.value()
                .as_element()
                .is_some_and(|e| e.name().eq_ignore_ascii_case(name))
        })?)?;
    }
    Some(current.id())
}

fn nth_child(
    parent: NodeRef<'_, Node>,
    index: usize,
    matches: impl Fn(&NodeRef<'_, Node>) -> bool,
) -> Option<NodeId> {
    parent
        .children()
        .filter(|c| matches(c))
        .nth(index.checked_sub(1)?)
        .map(|c| c.id())
}

/// Split `tag[3]` into `("tag", 3)`; a bare `tag` means index 1.
fn parse_step(step: &str) -> Option<(&str, usize)> {
    if step.is_empty() {
        return None;
    }
    match step.find('[') {
        None => Some((step, 1)),
        Some(open) => {
            let index = step[open + 1..].strip_suffix(']')?.parse().ok()?;
            Some((&step[..open], index))
        }
    }
}
