//! Persisted data model: annotations, page notes and the store record.
//!
//! Field names serialize in camelCase so the JSON file stays readable by the
//! browser-side tooling that shares it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::fingerprint::Fingerprint;

/// Schema tag of the persisted record.
pub const RECORD_VERSION: u32 = 1;

/// Generate a short, time-prefixed random identifier.
pub fn new_id() -> String {
    format!(
        "{:x}{:06x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>() & 0x00ff_ffff
    )
}

// ---------------------------------------------------------------------------
// Anchors
// ---------------------------------------------------------------------------

/// A captured text selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedRange {
    pub start_path: String,
    pub start_offset: usize,
    pub end_path: String,
    pub end_offset: usize,
    /// Exact text at capture time; every restore is validated against it.
    pub selected_text: String,
    #[serde(default)]
    pub context_before: String,
    #[serde(default)]
    pub context_after: String,
}

/// A captured element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementLocator {
    /// CSS selector that matched exactly this element when generated.
    pub structural_selector: String,
    /// Structural path fallback.
    pub path: String,
    pub description: String,
    pub tag_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub preview_markup: String,
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Lifecycle of an annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    #[default]
    Open,
    InProgress,
    Addressed,
    Resolved,
}

impl AnnotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Addressed => "addressed",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AnnotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for AnnotationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "addressed" => Ok(Self::Addressed),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!(
                "unknown status \"{other}\" (expected open, in_progress, addressed or resolved)"
            )),
        }
    }
}

/// Who wrote a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyAuthor {
    Agent,
    Reviewer,
}

impl std::str::FromStr for ReplyAuthor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "reviewer" => Ok(Self::Reviewer),
            other => Err(format!(
                "unknown author \"{other}\" (expected agent or reviewer)"
            )),
        }
    }
}

impl std::fmt::Display for ReplyAuthor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Agent => "agent",
            Self::Reviewer => "reviewer",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub author: ReplyAuthor,
    pub text: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// Fields shared by every annotation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationBase {
    pub id: String,
    pub page_url: String,
    #[serde(default)]
    pub page_title: String,
    pub note: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AnnotationStatus,
    /// When the status last became `resolved`. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Append-only thread.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
}

impl AnnotationBase {
    pub fn new(
        page_url: impl Into<String>,
        page_title: impl Into<String>,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            page_url: page_url.into(),
            page_title: page_title.into(),
            note: note.into(),
            created_at: now,
            updated_at: now,
            status: AnnotationStatus::Open,
            resolved_at: None,
            replies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    #[serde(flatten)]
    pub base: AnnotationBase,
    pub range: SerializedRange,
    /// Text that replaced the selection after an edit; used to re-anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAnnotation {
    #[serde(flatten)]
    pub base: AnnotationBase,
    pub element: ElementLocator,
}

/// An annotation anchored to either a text span or an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Annotation {
    Text(TextAnnotation),
    Element(ElementAnnotation),
}

impl Annotation {
    pub fn text(base: AnnotationBase, range: SerializedRange) -> Self {
        Self::Text(TextAnnotation {
            base,
            range,
            replaced_text: None,
        })
    }

    pub fn element(base: AnnotationBase, element: ElementLocator) -> Self {
        Self::Element(ElementAnnotation { base, element })
    }

    pub fn base(&self) -> &AnnotationBase {
        match self {
            Self::Text(a) => &a.base,
            Self::Element(a) => &a.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut AnnotationBase {
        match self {
            Self::Text(a) => &mut a.base,
            Self::Element(a) => &mut a.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn status(&self) -> AnnotationStatus {
        self.base().status
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Element(_) => "element",
        }
    }

    /// One-line label: the quoted selection or the element description.
    pub fn label(&self) -> String {
        match self {
            Self::Text(a) => format!("\"{}\"", a.range.selected_text),
            Self::Element(a) => a.element.description.clone(),
        }
    }

    pub fn set_status(&mut self, status: AnnotationStatus, now: DateTime<Utc>) {
        let base = self.base_mut();
        base.status = status;
        base.resolved_at = (status == AnnotationStatus::Resolved).then_some(now);
        base.updated_at = now;
    }

    pub fn edit_note(&mut self, note: impl Into<String>, now: DateTime<Utc>) {
        let base = self.base_mut();
        base.note = note.into();
        base.updated_at = now;
    }

    /// Append a reply to the thread.
    pub fn add_reply(
        &mut self,
        author: ReplyAuthor,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> &Reply {
        let base = self.base_mut();
        base.updated_at = now;
        base.replies.push(Reply {
            id: new_id(),
            author,
            text: text.into(),
            created_at: now,
        });
        &base.replies[base.replies.len() - 1]
    }
}

// ---------------------------------------------------------------------------
// Page notes
// ---------------------------------------------------------------------------

/// A note about a whole page, with no anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNote {
    pub id: String,
    pub page_url: String,
    #[serde(default)]
    pub page_title: String,
    pub note: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl PageNote {
    pub fn new(
        page_url: impl Into<String>,
        page_title: impl Into<String>,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            page_url: page_url.into(),
            page_title: page_title.into(),
            note: note.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Store record
// ---------------------------------------------------------------------------

/// The whole persisted aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    pub version: u32,
    pub annotations: Vec<Annotation>,
    pub page_notes: Vec<PageNote>,
}

impl Default for StoreRecord {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            annotations: Vec::new(),
            page_notes: Vec::new(),
        }
    }
}

impl StoreRecord {
    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn annotation_mut(&mut self, id: &str) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id() == id)
    }

    /// Insert, replacing any annotation with the same id.
    pub fn insert_annotation(&mut self, annotation: Annotation) {
        match self.annotation_mut(annotation.id()) {
            Some(existing) => *existing = annotation,
            None => self.annotations.push(annotation),
        }
    }

    pub fn remove_annotation(&mut self, id: &str) -> Option<Annotation> {
        let pos = self.annotations.iter().position(|a| a.id() == id)?;
        Some(self.annotations.remove(pos))
    }

    pub fn annotations_for_page<'a>(
        &'a self,
        page_url: &'a str,
    ) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations
            .iter()
            .filter(move |a| a.base().page_url == page_url)
    }

    pub fn page_note(&self, id: &str) -> Option<&PageNote> {
        self.page_notes.iter().find(|n| n.id == id)
    }

    /// Insert, replacing any page note with the same id.
    pub fn insert_page_note(&mut self, note: PageNote) {
        match self.page_notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note,
            None => self.page_notes.push(note),
        }
    }

    pub fn remove_page_note(&mut self, id: &str) -> Option<PageNote> {
        let pos = self.page_notes.iter().position(|n| n.id == id)?;
        Some(self.page_notes.remove(pos))
    }

    pub fn page_notes_for<'a>(&'a self, page_url: &'a str) -> impl Iterator<Item = &'a PageNote> + 'a {
        self.page_notes
            .iter()
            .filter(move |n| n.page_url == page_url)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> SerializedRange {
        SerializedRange {
            start_path: "/html[1]/body[1]/p[1]/text()[1]".into(),
            start_offset: 0,
            end_path: "/html[1]/body[1]/p[1]/text()[1]".into(),
            end_offset: 5,
            selected_text: "hello".into(),
            context_before: String::new(),
            context_after: " world".into(),
        }
    }

    #[test]
    fn text_annotation_json_shape() {
        let now = Utc::now();
        let a = Annotation::text(AnnotationBase::new("http://x/", "X", "typo", now), range());
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["pageUrl"], "http://x/");
        assert_eq!(json["status"], "open");
        assert_eq!(json["range"]["selectedText"], "hello");
        assert!(json.get("replies").is_none());
        assert!(json.get("replacedText").is_none());

        let back: Annotation = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn status_transitions_track_resolution_time() {
        let now = Utc::now();
        let mut a = Annotation::text(AnnotationBase::new("u", "", "n", now), range());
        let later = now + chrono::Duration::seconds(5);
        a.set_status(AnnotationStatus::Resolved, later);
        assert_eq!(a.base().resolved_at, Some(later));
        assert_eq!(a.base().updated_at, later);

        a.set_status(AnnotationStatus::InProgress, later);
        assert_eq!(a.base().resolved_at, None);
        assert_eq!(
            serde_json::to_value(a.status()).unwrap(),
            serde_json::json!("in_progress")
        );
    }

    #[test]
    fn replies_append_in_order() {
        let now = Utc::now();
        let mut a = Annotation::text(AnnotationBase::new("u", "", "n", now), range());
        a.add_reply(ReplyAuthor::Agent, "on it", now);
        a.add_reply(ReplyAuthor::Reviewer, "thanks", now);
        let replies = &a.base().replies;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].author, ReplyAuthor::Agent);
        assert_eq!(replies[1].text, "thanks");
    }

    #[test]
    fn record_insert_replaces_by_id() {
        let now = Utc::now();
        let mut record = StoreRecord::default();
        let a = Annotation::text(AnnotationBase::new("u", "", "first", now), range());
        let id = a.id().to_string();
        record.insert_annotation(a.clone());

        let mut edited = a;
        edited.edit_note("second", now);
        record.insert_annotation(edited);

        assert_eq!(record.annotations.len(), 1);
        assert_eq!(record.annotation(&id).unwrap().base().note, "second");
        assert!(record.remove_annotation(&id).is_some());
        assert!(record.remove_annotation(&id).is_none());
    }

    #[test]
    fn status_parses_loosely() {
        assert_eq!(
            "In-Progress".parse::<AnnotationStatus>().unwrap(),
            AnnotationStatus::InProgress
        );
        assert!("done".parse::<AnnotationStatus>().is_err());
    }
}
