//! Context matching: the tier 2 text restore.
//!
//! Searches the whole body text for the selected string. A unique hit is
//! taken as is. Repeated text is disambiguated by how much of the stored
//! context windows still surrounds each candidate; a winner that keeps less
//! than `min_score` of the possible context is rejected.

use ego_tree::NodeId;

use crate::document::{Document, TextPoint, TextRange, char_len};

/// One text node's slice of the concatenated body text.
#[derive(Debug, Clone, Copy)]
struct Span {
    node: NodeId,
    start: usize,
    len: usize,
}

/// Body text flattened into chars, with an offset -> node index.
struct TextIndex {
    chars: Vec<char>,
    spans: Vec<Span>,
}

impl TextIndex {
    fn build(doc: &Document) -> Self {
        let mut chars = Vec::new();
        let mut spans = Vec::new();
        for node in doc.text_nodes_under(doc.body()) {
            let text = doc.text_of(node).unwrap_or_default();
            let len = char_len(text);
            if len == 0 {
                continue;
            }
            spans.push(Span {
                node,
                start: chars.len(),
                len,
            });
            chars.extend(text.chars());
        }
        Self { chars, spans }
    }

    /// Every start offset at which `needle` occurs, overlapping hits included.
    fn occurrences(&self, needle: &[char]) -> Vec<usize> {
        if needle.is_empty() || needle.len() > self.chars.len() {
            return Vec::new();
        }
        self.chars
            .windows(needle.len())
            .enumerate()
            .filter(|(_, w)| *w == needle)
            .map(|(i, _)| i)
            .collect()
    }

    /// Live point for a flat offset where a match begins.
    fn start_point(&self, offset: usize) -> Option<TextPoint> {
        let idx = self.spans.partition_point(|s| s.start + s.len <= offset);
        let span = self.spans.get(idx)?;
        Some(TextPoint::new(span.node, offset - span.start))
    }

    /// Live point for a flat offset where a match ends (exclusive).
    fn end_point(&self, offset: usize) -> Option<TextPoint> {
        let idx = self.spans.partition_point(|s| s.start + s.len < offset);
        let span = self.spans.get(idx)?;
        Some(TextPoint::new(span.node, offset - span.start))
    }

    fn range(&self, start: usize, end: usize) -> Option<TextRange> {
        Some(TextRange::new(self.start_point(start)?, self.end_point(end)?))
    }
}

/// Locate `selected` by literal search, using the context windows to pick
/// among repeated occurrences.
pub fn find_by_context(
    doc: &Document,
    selected: &str,
    context_before: &str,
    context_after: &str,
    min_score: f64,
) -> Option<TextRange> {
    let index = TextIndex::build(doc);
    let needle: Vec<char> = selected.chars().collect();
    let hits = index.occurrences(&needle);

    match hits.as_slice() {
        [] => None,
        [only] => index.range(*only, only + needle.len()),
        _ => {
            let before: Vec<char> = context_before.chars().collect();
            let after: Vec<char> = context_after.chars().collect();

            let mut best: Option<(usize, usize)> = None;
            for &hit in &hits {
                let end = hit + needle.len();
                let preceding = &index.chars[hit.saturating_sub(before.len())..hit];
                let following = &index.chars[end..(end + after.len()).min(index.chars.len())];
                let score = common_suffix(preceding, &before) + common_prefix(following, &after);
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((hit, score));
                }
            }

            let (hit, score) = best?;
            let possible = before.len() + after.len();
            if (score as f64) < min_score * possible as f64 {
                tracing::debug!(
                    candidates = hits.len(),
                    score,
                    possible,
                    "best context match below threshold"
                );
                return None;
            }
            index.range(hit, hit + needle.len())
        }
    }
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_offset(doc: &Document, point: TextPoint) -> usize {
        let mut offset = 0;
        for node in doc.text_nodes_under(doc.body()) {
            if node == point.node {
                return offset + point.offset;
            }
            offset += char_len(doc.text_of(node).unwrap());
        }
        panic!("point not in body");
    }

    #[test]
    fn context_picks_second_occurrence() {
        let doc = Document::parse("<html><body><p>the cat sat on the mat</p></body></html>");
        let range = find_by_context(&doc, "the", "on ", " mat", 0.3).unwrap();
        assert_eq!(range.start.offset, 15);
        assert_eq!(range.end.offset, 18);
        assert_eq!(flat_offset(&doc, range.start), 15);
        assert_eq!(doc.range_text(&range).as_deref(), Some("the"));
    }

    #[test]
    fn unique_match_ignores_wrong_context() {
        let doc = Document::parse("<html><body><p>the cat sat on the mat</p></body></html>");
        let range = find_by_context(&doc, "cat", "zzzz", "qqqq", 0.3).unwrap();
        assert_eq!(range.start.offset, 4);
        let range = find_by_context(&doc, "mat", "", "", 0.3).unwrap();
        assert_eq!(range.start.offset, 19);
    }

    #[test]
    fn absent_text_is_not_found() {
        let doc = Document::parse("<html><body><p>the cat sat on the mat</p></body></html>");
        assert!(find_by_context(&doc, "dog", "", "", 0.3).is_none());
        assert!(find_by_context(&doc, "", "the ", "", 0.3).is_none());
    }

    #[test]
    fn weak_context_on_repeated_text_is_rejected() {
        let doc = Document::parse("<html><body><p>alpha x beta x gamma</p></body></html>");
        assert!(find_by_context(&doc, "x", "qqqqqqqqq", "wwwwwwwww", 0.3).is_none());
    }

    #[test]
    fn ties_prefer_document_order() {
        let doc = Document::parse("<html><body><p>ab ab</p></body></html>");
        let range = find_by_context(&doc, "ab", "", "", 0.3).unwrap();
        assert_eq!(range.start.offset, 0);
    }

    #[test]
    fn matches_spanning_nodes_map_back_to_live_points() {
        let doc = Document::parse(
            "<html><body><p>intro</p><p>say <b>hello</b> world</p><p>say hello there</p></body></html>",
        );
        let range = find_by_context(&doc, "say hello", "intro", " world", 0.3).unwrap();
        assert_eq!(doc.range_text(&range).as_deref(), Some("say hello"));
        assert_ne!(range.start.node, range.end.node);
        assert_eq!(doc.text_of(range.end.node), Some("hello"));
    }
}
