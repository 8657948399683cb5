//! Read-time validation and migration of the persisted record.
//!
//! Runs on every read, so the file heals itself: entries from older writers
//! are upgraded in place, entries that cannot be anchored or displayed are
//! dropped with a warning, and a record with the wrong overall shape is
//! rejected as a whole.

use serde_json::{Map, Value};

use crate::model::{Annotation, PageNote, RECORD_VERSION, StoreRecord};

/// Fields every annotation and page note must carry as strings.
const REQUIRED_FIELDS: &[&str] = &["id", "pageUrl", "note"];

/// Range fields that legacy text annotations stored at the top level.
const LEGACY_RANGE_FIELDS: &[&str] = &[
    "startPath",
    "startOffset",
    "endPath",
    "endOffset",
    "selectedText",
    "contextBefore",
    "contextAfter",
];

/// Validate the record's shape and migrate its entries.
///
/// `Err` carries a human-readable reason the whole record was rejected.
pub fn migrate(value: Value) -> Result<StoreRecord, String> {
    let Value::Object(mut root) = value else {
        return Err("record is not a JSON object".into());
    };

    match root.get("version").and_then(Value::as_u64) {
        Some(v) if v == u64::from(RECORD_VERSION) => {}
        other => return Err(format!("unsupported record version {other:?}")),
    }

    let Some(Value::Array(raw_annotations)) = root.remove("annotations") else {
        return Err("\"annotations\" is not a list".into());
    };
    let Some(Value::Array(raw_notes)) = root.remove("pageNotes") else {
        return Err("\"pageNotes\" is not a list".into());
    };

    let annotations = raw_annotations
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| migrate_annotation(index, entry))
        .collect();
    let page_notes = raw_notes
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| migrate_page_note(index, entry))
        .collect();

    Ok(StoreRecord {
        version: RECORD_VERSION,
        annotations,
        page_notes,
    })
}

fn migrate_annotation(index: usize, entry: Value) -> Option<Annotation> {
    let Value::Object(mut obj) = entry else {
        tracing::warn!(index, "dropping annotation: not an object");
        return None;
    };
    if let Some(missing) = missing_required(&obj) {
        tracing::warn!(index, field = missing, "dropping annotation: missing required field");
        return None;
    }

    if !obj.contains_key("type") {
        obj.insert("type".into(), Value::from("text"));
        if !obj.contains_key("range") {
            let mut range = Map::new();
            for field in LEGACY_RANGE_FIELDS {
                if let Some(v) = obj.remove(*field) {
                    range.insert((*field).to_string(), v);
                }
            }
            obj.insert("range".into(), Value::Object(range));
        }
    }

    let legacy_resolved = obj
        .remove("resolved")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !obj.contains_key("status") {
        let resolved = legacy_resolved || obj.get("resolvedAt").is_some_and(|v| !v.is_null());
        let status = if resolved { "resolved" } else { "open" };
        obj.insert("status".into(), Value::from(status));
    }

    let id = obj.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    match serde_json::from_value(Value::Object(obj)) {
        Ok(annotation) => Some(annotation),
        Err(e) => {
            tracing::warn!(index, id = %id, error = %e, "dropping annotation: malformed entry");
            None
        }
    }
}

fn migrate_page_note(index: usize, entry: Value) -> Option<PageNote> {
    let Value::Object(obj) = entry else {
        tracing::warn!(index, "dropping page note: not an object");
        return None;
    };
    if let Some(missing) = missing_required(&obj) {
        tracing::warn!(index, field = missing, "dropping page note: missing required field");
        return None;
    }
    match serde_json::from_value(Value::Object(obj)) {
        Ok(note) => Some(note),
        Err(e) => {
            tracing::warn!(index, error = %e, "dropping page note: malformed entry");
            None
        }
    }
}

fn missing_required(obj: &Map<String, Value>) -> Option<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .find(|field| !obj.get(*field).is_some_and(Value::is_string))
}
