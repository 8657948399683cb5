//! Durability and concurrency tests for the annotation store.
//!
//! These tests drive the store the way two writers would: the interactive
//! surface and an agent mutating the same file at once.

use chrono::Utc;

use redline::anchor::range;
use redline::document::Document;
use redline::error::StoreError;
use redline::model::{Annotation, AnnotationBase, AnnotationStatus, PageNote, StoreRecord};
use redline::store::AnnotationStore;

const URL: &str = "http://localhost:3000/";

fn text_annotation(note: &str) -> Annotation {
    let doc = Document::parse("<p>The build is green again.</p>");
    let selection = doc.find_text("green").unwrap();
    Annotation::text(
        AnnotationBase::new(URL, "Status", note, Utc::now()),
        range::serialize(&doc, &selection, 30).unwrap(),
    )
}

fn open_store(dir: &tempfile::TempDir) -> AnnotationStore {
    AnnotationStore::open(dir.path().join("annotations.json")).unwrap()
}

#[tokio::test]
async fn concurrent_mutations_are_all_applied() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut handles = Vec::new();
    for i in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .mutate(move |mut record| {
                    record.insert_annotation(text_annotation(&format!("note {i}")));
                    Ok(record)
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = store.read().await.unwrap();
    assert_eq!(record.annotations.len(), 5);
    let mut notes: Vec<_> = record.annotations.iter().map(|a| a.base().note.clone()).collect();
    notes.sort();
    assert_eq!(notes, ["note 0", "note 1", "note 2", "note 3", "note 4"]);
}

#[tokio::test]
async fn failed_transform_leaves_file_untouched() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir);
    store
        .mutate(|mut record| {
            record.insert_annotation(text_annotation("keep me"));
            Ok(record)
        })
        .await
        .unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let failed = store
        .mutate(|mut record| {
            record.annotations.clear();
            Err("agent rejected the edit".into())
        })
        .await;
    assert!(matches!(failed, Err(StoreError::TransformFailed { .. })));
    assert_eq!(std::fs::read(store.path()).unwrap(), before);

    // The queue keeps serving after a failure.
    let note = PageNote::new(URL, "Status", "after", Utc::now());
    let note_id = note.id.clone();
    store
        .mutate(move |mut record| {
            record.insert_page_note(note);
            Ok(record)
        })
        .await
        .unwrap();
    let record = store.read().await.unwrap();
    assert_eq!(record.annotations.len(), 1);
    assert_eq!(record.page_note(&note_id).map(|n| n.note.as_str()), Some("after"));
}

#[tokio::test]
async fn panicking_transform_leaves_file_untouched() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir);
    store
        .mutate(|mut record| {
            record.insert_annotation(text_annotation("keep me"));
            Ok(record)
        })
        .await
        .unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let panicked = store
        .mutate(|_record: StoreRecord| -> Result<StoreRecord, redline::error::TransformError> {
            panic!("transform bug")
        })
        .await;
    assert!(matches!(panicked, Err(StoreError::TransformPanicked)));
    assert_eq!(std::fs::read(store.path()).unwrap(), before);

    let record = store.mutate(Ok).await.unwrap();
    assert_eq!(record.annotations.len(), 1);
}

#[tokio::test]
async fn corrupt_files_read_as_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir);

    for content in [
        "{ not json",
        r#"{"version": 2, "annotations": [], "pageNotes": []}"#,
        r#"{"version": 1, "annotations": {}, "pageNotes": []}"#,
        r#"{"version": 1, "annotations": []}"#,
        "[]",
    ] {
        std::fs::write(store.path(), content).unwrap();
        assert_eq!(store.read().await.unwrap(), StoreRecord::default(), "{content}");
    }

    // A mutation over a corrupt file starts from the empty record.
    let record = store
        .mutate(|mut record| {
            record.insert_annotation(text_annotation("fresh"));
            Ok(record)
        })
        .await
        .unwrap();
    assert_eq!(record.annotations.len(), 1);
}

#[tokio::test]
async fn invalid_entries_are_dropped_on_read() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut record = StoreRecord::default();
    record.insert_annotation(text_annotation("valid"));
    let mut value = serde_json::to_value(&record).unwrap();
    value["annotations"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "id": "broken", "note": "no page url" }));
    std::fs::write(store.path(), serde_json::to_string(&value).unwrap()).unwrap();

    let read = store.read().await.unwrap();
    assert_eq!(read.annotations.len(), 1);
    assert_eq!(read.annotations[0].base().note, "valid");
}

#[tokio::test]
async fn fingerprint_tracks_every_kind_of_change() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir);

    let empty = store.fingerprint().await.unwrap();
    assert_eq!(store.fingerprint().await.unwrap(), empty);

    let annotation = text_annotation("first");
    let id = annotation.id().to_string();
    store
        .mutate(move |mut record| {
            record.insert_annotation(annotation);
            Ok(record)
        })
        .await
        .unwrap();
    let created = store.fingerprint().await.unwrap();
    assert_ne!(created, empty);
    assert_eq!(store.fingerprint().await.unwrap(), created);

    let target = id.clone();
    store
        .mutate(move |mut record| {
            record
                .annotation_mut(&target)
                .ok_or("missing")?
                .set_status(AnnotationStatus::Resolved, Utc::now() + chrono::Duration::seconds(1));
            Ok(record)
        })
        .await
        .unwrap();
    let updated = store.fingerprint().await.unwrap();
    assert_ne!(updated, created);

    store
        .mutate(move |mut record| {
            record.remove_annotation(&id);
            Ok(record)
        })
        .await
        .unwrap();
    let deleted = store.fingerprint().await.unwrap();
    assert_ne!(deleted, updated);
}

#[tokio::test]
async fn status_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let annotation = text_annotation("survivor");
    let id = annotation.id().to_string();

    {
        let store = open_store(&dir);
        let target = id.clone();
        store
            .mutate(move |mut record| {
                record.insert_annotation(annotation);
                let a = record.annotation_mut(&target).ok_or("missing")?;
                a.set_status(AnnotationStatus::Resolved, Utc::now());
                Ok(record)
            })
            .await
            .unwrap();
    }

    let store = open_store(&dir);
    let record = store.read().await.unwrap();
    let a = record.annotation(&id).unwrap();
    assert_eq!(a.status(), AnnotationStatus::Resolved);
    assert!(a.base().resolved_at.is_some());

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(!raw.contains("\"resolved\":"));
    assert!(raw.contains("\"status\": \"resolved\""));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_handles_never_tear_the_file() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("annotations.json");
    let first = AnnotationStore::open(&path).unwrap();
    let second = AnnotationStore::open(&path).unwrap();
    first.write(StoreRecord::default()).await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let done = done.clone();
        let path = path.clone();
        tokio::task::spawn_blocking(move || {
            let mut snapshots = 0usize;
            let mut torn = 0usize;
            while !done.load(Ordering::Relaxed) {
                let raw = std::fs::read_to_string(&path).unwrap();
                snapshots += 1;
                if serde_json::from_str::<serde_json::Value>(&raw).is_err() {
                    torn += 1;
                }
            }
            (snapshots, torn)
        })
    };

    let mut handles = Vec::new();
    for (n, store) in [first.clone(), second.clone()].into_iter().enumerate() {
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .mutate(move |mut record| {
                        record.insert_annotation(text_annotation(&format!("writer {n} #{i}")));
                        Ok(record)
                    })
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    done.store(true, Ordering::Relaxed);

    let (snapshots, torn) = reader.await.unwrap();
    assert!(snapshots > 0);
    assert_eq!(torn, 0, "{torn} of {snapshots} snapshots were partial JSON");

    // Updates from two handles may overwrite each other, but the final file
    // is a whole record and no temp files are left behind.
    assert!(!first.read().await.unwrap().annotations.is_empty());
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, [std::ffi::OsString::from("annotations.json")]);
}
