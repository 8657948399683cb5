//! Anchor capture and restoration.
//!
//! Restoring an annotation walks an explicit ladder of locators, each of
//! which answers "found" or "not found" on its own:
//!
//! | kind    | tier            | locator                                  |
//! |---------|-----------------|------------------------------------------|
//! | text    | `Path`          | [`range::deserialize`], exact and cheap  |
//! | text    | `Context`       | [`context::find_by_context`] on the text |
//! | text    | `Replacement`   | the same search for `replaced_text`      |
//! | element | `Selector`      | [`element::resolve_by_selector`]         |
//! | element | `ElementPath`   | [`element::resolve_by_path`]             |
//!
//! Falling off the end of the ladder is `None`, which the orphan tracker
//! turns into a confidence label.

pub mod context;
pub mod element;
pub mod path;
pub mod range;

use ego_tree::NodeId;

use crate::document::{Document, TextRange};
use crate::model::{Annotation, ElementAnnotation, TextAnnotation};

/// Tunables for text restoration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    /// Maximum length of each captured context window, in chars.
    pub context_chars: usize,
    /// Fraction of the possible context score a repeated match must reach.
    pub min_context_score: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            context_chars: 30,
            min_context_score: 0.3,
        }
    }
}

/// Which locator produced an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Path,
    Context,
    Replacement,
    Selector,
    ElementPath,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Context => "context",
            Self::Replacement => "replacement",
            Self::Selector => "selector",
            Self::ElementPath => "element-path",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A live location an annotation resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Text { range: TextRange, tier: Tier },
    Element { node: NodeId, tier: Tier },
}

impl Anchor {
    pub fn tier(&self) -> Tier {
        match self {
            Self::Text { tier, .. } | Self::Element { tier, .. } => *tier,
        }
    }
}

/// Restore any annotation against `doc`.
pub fn restore(doc: &Document, annotation: &Annotation, options: &MatchOptions) -> Option<Anchor> {
    let anchor = match annotation {
        Annotation::Text(a) => restore_text(doc, a, options),
        Annotation::Element(a) => restore_element(doc, a),
    };
    match &anchor {
        Some(found) => tracing::debug!(id = %annotation.id(), tier = %found.tier(), "annotation anchored"),
        None => tracing::debug!(id = %annotation.id(), "annotation not found by any tier"),
    }
    anchor
}

/// Restore a text annotation: exact path, then context, then replacement text.
pub fn restore_text(
    doc: &Document,
    annotation: &TextAnnotation,
    options: &MatchOptions,
) -> Option<Anchor> {
    let stored = &annotation.range;
    let text = |range: TextRange, tier: Tier| Anchor::Text { range, tier };

    range::deserialize(doc, stored)
        .map(|r| text(r, Tier::Path))
        .or_else(|| {
            context::find_by_context(
                doc,
                &stored.selected_text,
                &stored.context_before,
                &stored.context_after,
                options.min_context_score,
            )
            .map(|r| text(r, Tier::Context))
        })
        .or_else(|| {
            let replaced = annotation.replaced_text.as_deref()?;
            context::find_by_context(
                doc,
                replaced,
                &stored.context_before,
                &stored.context_after,
                options.min_context_score,
            )
            .map(|r| text(r, Tier::Replacement))
        })
}

/// Restore an element annotation: selector, then structural path.
pub fn restore_element(doc: &Document, annotation: &ElementAnnotation) -> Option<Anchor> {
    let locator = &annotation.element;
    element::resolve_by_selector(doc, locator)
        .map(|node| Anchor::Element {
            node,
            tier: Tier::Selector,
        })
        .or_else(|| {
            element::resolve_by_path(doc, locator).map(|node| Anchor::Element {
                node,
                tier: Tier::ElementPath,
            })
        })
}
