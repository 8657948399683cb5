// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # redline
//!
//! Review annotations for rendered HTML documents that survive edits.
//!
//! ## Architecture
//!
//! - **Document model** (`document`): parsed HTML tree with char-offset text points
//! - **Anchoring** (`anchor`): path, context and replacement tiers for text;
//!   selector and structural path for elements
//! - **Orphan tracking** (`orphan`): anchored / checking / orphaned with a grace period
//! - **Store** (`store`): one JSON record, atomic writes, serialized mutations,
//!   change fingerprints
//! - **Session** (`session`): the pieces above held together while a page is reviewed
//!
//! ## Library usage
//!
//! ```no_run
//! use redline::anchor::{self, MatchOptions, range};
//! use redline::document::Document;
//! use redline::model::{Annotation, AnnotationBase};
//!
//! let doc = Document::parse("<p>Ship it on Friday.</p>");
//! let selection = doc.find_text("Friday").unwrap();
//! let stored = range::serialize(&doc, &selection, 30).unwrap();
//! let base = AnnotationBase::new("http://localhost/", "Plan", "too soon?", chrono::Utc::now());
//! let annotation = Annotation::text(base, stored);
//!
//! let edited = Document::parse("<h1>Plan</h1><p>Ship it on Friday.</p>");
//! let found = anchor::restore(&edited, &annotation, &MatchOptions::default());
//! assert!(found.is_some());
//! ```

pub mod anchor;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod orphan;
pub mod session;
pub mod store;
