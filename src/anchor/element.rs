//! Element locators: unique CSS selectors with a structural-path fallback.
//!
//! Selector generation tries, in order, the element's `id`, its
//! `data-testid`, its tag plus every class, and finally a `parent > child`
//! chain of positional parts built upward until it matches exactly one node.
//! Each candidate is checked against the live document; attribute presence
//! alone never counts as uniqueness, since real pages repeat ids.

use std::collections::BTreeMap;

use ego_tree::NodeId;
use scraper::ElementRef;

use crate::anchor::path;
use crate::document::{Document, char_len, char_slice};
use crate::model::ElementLocator;

/// Attribute used by test suites to tag elements.
pub const TEST_ID_ATTR: &str = "data-testid";

/// Attributes captured into a locator. Nothing else is stored.
pub const CAPTURED_ATTRS: &[&str] = &[
    "id",
    "class",
    TEST_ID_ATTR,
    "src",
    "alt",
    "href",
    "role",
    "aria-label",
    "type",
    "name",
];

const DESCRIPTION_VALUE_CHARS: usize = 40;
const PREVIEW_CHARS: usize = 200;

/// Build a locator for an element. `None` if `id` is not an element.
pub fn locate(doc: &Document, id: NodeId) -> Option<ElementLocator> {
    let el = doc.element(id)?;
    let tag_name = el.value().name().to_string();
    let attributes: BTreeMap<String, String> = CAPTURED_ATTRS
        .iter()
        .filter_map(|name| {
            el.value()
                .attr(name)
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();

    Some(ElementLocator {
        structural_selector: unique_selector(doc, el),
        path: path::address_of(doc, id)?,
        description: describe(&tag_name, &attributes),
        tag_name,
        attributes,
        preview_markup: truncate(&el.html(), PREVIEW_CHARS),
    })
}

/// Resolve a stored locator: selector first, then structural path.
pub fn resolve(doc: &Document, locator: &ElementLocator) -> Option<NodeId> {
    resolve_by_selector(doc, locator).or_else(|| resolve_by_path(doc, locator))
}

/// First element matching the stored selector. Stale or malformed selectors
/// simply match nothing.
pub fn resolve_by_selector(doc: &Document, locator: &ElementLocator) -> Option<NodeId> {
    doc.select(&locator.structural_selector).into_iter().next()
}

/// Element at the stored structural path, if it still has the stored tag.
pub fn resolve_by_path(doc: &Document, locator: &ElementLocator) -> Option<NodeId> {
    let id = path::resolve(doc, &locator.path)?;
    let el = doc.element(id)?;
    el.value()
        .name()
        .eq_ignore_ascii_case(&locator.tag_name)
        .then_some(id)
}

/// Short human label: `tag`, `tag#id` or `tag.class`, plus the remaining
/// captured attributes in parentheses. Display only, never matched on.
pub fn describe(tag: &str, attributes: &BTreeMap<String, String>) -> String {
    let mut label = tag.to_string();
    if let Some(id) = attributes.get("id").filter(|v| !v.is_empty()) {
        label.push('#');
        label.push_str(id);
    } else if let Some(class) = attributes
        .get("class")
        .and_then(|c| c.split_whitespace().next())
    {
        label.push('.');
        label.push_str(class);
    }

    let extras: Vec<String> = attributes
        .iter()
        .filter(|(k, _)| k.as_str() != "id" && k.as_str() != "class")
        .map(|(k, v)| format!("{k}=\"{}\"", truncate(v, DESCRIPTION_VALUE_CHARS)))
        .collect();
    if !extras.is_empty() {
        label.push_str(" (");
        label.push_str(&extras.join(", "));
        label.push(')');
    }
    label
}

fn unique_selector(doc: &Document, el: ElementRef<'_>) -> String {
    let target = el.id();
    let is_unique = |css: &str| doc.select(css) == [target];
    let value = el.value();

    if let Some(id) = value.attr("id").filter(|v| !v.is_empty()) {
        let css = format!("#{}", css_ident(id));
        if is_unique(&css) {
            return css;
        }
    }

    if let Some(test_id) = value.attr(TEST_ID_ATTR).filter(|v| !v.is_empty()) {
        let css = format!("[{TEST_ID_ATTR}={}]", css_string(test_id));
        if is_unique(&css) {
            return css;
        }
    }

    let classes: Vec<&str> = value.classes().collect();
    if !classes.is_empty() {
        let css = classes.iter().fold(value.name().to_string(), |acc, c| {
            format!("{acc}.{}", css_ident(c))
        });
        if is_unique(&css) {
            return css;
        }
    }

    // Walk upward, prepending the most specific part of each ancestor.
    let mut css = best_part(el);
    let mut current = el;
    loop {
        if is_unique(&css) {
            return css;
        }
        match current.parent().and_then(ElementRef::wrap) {
            Some(parent) => {
                css = format!("{} > {css}", best_part(parent));
                current = parent;
            }
            None => break,
        }
    }

    // Ids repeated along the chain can keep it ambiguous; a purely positional
    // chain from the root cannot be.
    let mut parts = vec![positional_part(el)];
    let mut current = el;
    while let Some(parent) = current.parent().and_then(ElementRef::wrap) {
        parts.push(positional_part(parent));
        current = parent;
    }
    parts.reverse();
    let css = parts.join(" > ");
    if !is_unique(&css) {
        tracing::debug!(selector = %css, "positional selector is not unique");
    }
    css
}

fn best_part(el: ElementRef<'_>) -> String {
    let value = el.value();
    if let Some(id) = value.attr("id").filter(|v| !v.is_empty()) {
        return format!("#{}", css_ident(id));
    }
    if let Some(test_id) = value.attr(TEST_ID_ATTR).filter(|v| !v.is_empty()) {
        return format!("[{TEST_ID_ATTR}={}]", css_string(test_id));
    }
    positional_part(el)
}

/// `tag:nth-of-type(n)`, with `n` counted among same-tag siblings.
fn positional_part(el: ElementRef<'_>) -> String {
    let name = el.value().name();
    let position = 1 + el
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|s| s.value().name() == name)
        .count();
    format!("{name}:nth-of-type({position})")
}

/// Escape a value for use as a CSS identifier.
fn css_ident(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let leading_digit = i == 0 && c.is_ascii_digit();
        if leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Quote a value as a CSS string.
fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn truncate(value: &str, max: usize) -> String {
    if char_len(value) <= max {
        value.to_string()
    } else {
        format!("{}…", char_slice(value, 0, max))
    }
}
