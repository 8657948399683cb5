//! Range codec: live selections to and from `SerializedRange`.
//!
//! Serialization records both boundaries as structural paths plus char
//! offsets, the selected text verbatim, and short context windows taken from
//! the enclosing block. Deserialization is the exact (tier 1) restore: it
//! only succeeds when both paths resolve and the live text still equals the
//! captured `selected_text`.

use ego_tree::NodeId;

use crate::anchor::path;
use crate::document::{Document, TextPoint, TextRange, char_len, char_slice};
use crate::error::{RangeError, RangeResult};
use crate::model::SerializedRange;

/// Capture a live selection.
///
/// `context_chars` bounds each context window.
pub fn serialize(
    doc: &Document,
    range: &TextRange,
    context_chars: usize,
) -> RangeResult<SerializedRange> {
    for point in [range.start, range.end] {
        let text = doc.text_of(point.node).ok_or(RangeError::NotText)?;
        let len = char_len(text);
        if point.offset > len {
            return Err(RangeError::OffsetOutOfBounds {
                offset: point.offset,
                len,
            });
        }
    }
    let selected_text = doc.range_text(range).ok_or(RangeError::Inverted)?;
    let start_path = path::address_of(doc, range.start.node).ok_or(RangeError::NotText)?;
    let end_path = path::address_of(doc, range.end.node).ok_or(RangeError::NotText)?;

    let (block_text, at) = block_offset(doc, range.start);
    let context_before = block_text
        .map(|t| {
            let from = at.saturating_sub(context_chars);
            char_slice(&t, from, at).to_string()
        })
        .unwrap_or_default();

    let (block_text, at) = block_offset(doc, range.end);
    let context_after = block_text
        .map(|t| char_slice(&t, at, at + context_chars).to_string())
        .unwrap_or_default();

    Ok(SerializedRange {
        start_path,
        start_offset: range.start.offset,
        end_path,
        end_offset: range.end.offset,
        selected_text,
        context_before,
        context_after,
    })
}

/// Exact restore. `None` when either path misses or the text has changed.
pub fn deserialize(doc: &Document, serialized: &SerializedRange) -> Option<TextRange> {
    let start = resolve_text_node(doc, &serialized.start_path)?;
    let end = resolve_text_node(doc, &serialized.end_path)?;
    let range = TextRange::new(
        TextPoint::new(start, serialized.start_offset),
        TextPoint::new(end, serialized.end_offset),
    );
    let live = doc.range_text(&range)?;
    if live != serialized.selected_text {
        tracing::debug!(
            expected = %serialized.selected_text,
            found = %live,
            "range paths resolved but text differs"
        );
        return None;
    }
    Some(range)
}

fn resolve_text_node(doc: &Document, path: &str) -> Option<NodeId> {
    let id = path::resolve(doc, path)?;
    doc.text_of(id).map(|_| id)
}

/// Text of the block enclosing `point` and the char offset of `point` in it.
fn block_offset(doc: &Document, point: TextPoint) -> (Option<String>, usize) {
    let block = doc.block_ancestor(point.node);
    let mut text = String::new();
    let mut at = None;
    for id in doc.text_nodes_under(block) {
        let chunk = doc.text_of(id).unwrap_or_default();
        if id == point.node {
            at = Some(char_len(&text) + point.offset);
        }
        text.push_str(chunk);
    }
    match at {
        Some(at) => (Some(text), at),
        None => (None, 0),
    }
}
