//! Cheap change detection over a store record.
//!
//! A fingerprint is the total entry count plus the latest `updatedAt` across
//! annotations and page notes. Creates and deletes move the count, updates
//! move the timestamp, so two equal fingerprints mean "very likely unchanged".

use chrono::SecondsFormat;

use crate::error::StoreResult;
use crate::model::StoreRecord;
use crate::store::AnnotationStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(record: &StoreRecord) -> Self {
        let count = record.annotations.len() + record.page_notes.len();
        let latest = record
            .annotations
            .iter()
            .map(|a| a.base().updated_at)
            .chain(record.page_notes.iter().map(|n| n.updated_at))
            .max()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            .unwrap_or_default();
        Self(format!("{count}@{latest}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Polls a store and reports when its fingerprint moves.
pub struct FingerprintPoller {
    store: AnnotationStore,
    last: Option<Fingerprint>,
}

impl FingerprintPoller {
    pub fn new(store: AnnotationStore) -> Self {
        Self { store, last: None }
    }

    /// The fingerprint seen by the most recent poll.
    pub fn last(&self) -> Option<&Fingerprint> {
        self.last.as_ref()
    }

    /// Read the store; returns the new fingerprint if it differs from the
    /// previous poll. The first poll only primes the poller.
    pub async fn poll(&mut self) -> StoreResult<Option<Fingerprint>> {
        let current = self.store.read().await?.fingerprint();
        let changed = match &self.last {
            Some(prev) => *prev != current,
            None => false,
        };
        self.last = Some(current.clone());
        Ok(changed.then_some(current))
    }
}
