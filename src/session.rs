//! A review session over one store: anchoring, orphan tracking and
//! change detection held together for as long as a page is under review.

use std::time::Instant;

use crate::anchor::{self, MatchOptions, Tier};
use crate::config::Config;
use crate::document::Document;
use crate::error::StoreResult;
use crate::model::{AnnotationStatus, StoreRecord};
use crate::orphan::{AnchorState, OrphanTracker};
use crate::store::{AnnotationStore, Fingerprint, FingerprintPoller};

/// Outcome of checking one annotation against a live document.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationReport {
    pub id: String,
    pub kind: &'static str,
    pub label: String,
    pub status: AnnotationStatus,
    /// Tier that anchored the annotation, if any did.
    pub tier: Option<Tier>,
    pub state: AnchorState,
}

pub struct ReviewSession {
    store: AnnotationStore,
    poller: FingerprintPoller,
    tracker: OrphanTracker,
    options: MatchOptions,
}

impl ReviewSession {
    pub fn new(store: AnnotationStore, config: &Config) -> Self {
        Self {
            poller: FingerprintPoller::new(store.clone()),
            store,
            tracker: OrphanTracker::new(config.grace_period()),
            options: config.match_options(),
        }
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Fingerprint seen by the most recent [`refresh`](Self::refresh).
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.poller.last()
    }

    /// Poll the store fingerprint. When it moved, every grace window is
    /// restarted and the new fingerprint is returned.
    pub async fn refresh(&mut self) -> StoreResult<Option<Fingerprint>> {
        let changed = self.poller.poll().await?;
        if let Some(fp) = &changed {
            tracing::info!(fingerprint = %fp, "annotation store changed");
            self.tracker.reset();
        }
        Ok(changed)
    }

    /// Restore every annotation for `page_url` against `doc`.
    pub fn check_page(
        &mut self,
        doc: &Document,
        record: &StoreRecord,
        page_url: &str,
    ) -> Vec<AnnotationReport> {
        self.check_page_at(doc, record, page_url, Instant::now())
    }

    pub fn check_page_at(
        &mut self,
        doc: &Document,
        record: &StoreRecord,
        page_url: &str,
        now: Instant,
    ) -> Vec<AnnotationReport> {
        record
            .annotations_for_page(page_url)
            .map(|annotation| {
                let tier = anchor::restore(doc, annotation, &self.options).map(|a| a.tier());
                let state = self.tracker.get_state_at(
                    annotation.id(),
                    tier.is_some(),
                    annotation.status(),
                    now,
                );
                AnnotationReport {
                    id: annotation.id().to_string(),
                    kind: annotation.kind(),
                    label: annotation.label(),
                    status: annotation.status(),
                    tier,
                    state,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::anchor::range;
    use crate::model::{Annotation, AnnotationBase, PageNote};

    const URL: &str = "http://localhost/";
    const PAGE: &str = "<html><body><p>Ship the parser on Friday.</p></body></html>";

    fn friday_annotation() -> Annotation {
        let doc = Document::parse(PAGE);
        let range = doc.find_text("Friday").unwrap();
        Annotation::text(
            AnnotationBase::new(URL, "Plan", "too soon?", Utc::now()),
            range::serialize(&doc, &range, 30).unwrap(),
        )
    }

    #[tokio::test]
    async fn reports_anchor_tier_and_orphan_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(dir.path().join("store.json")).unwrap();
        let config = Config {
            grace_period_ms: 1_000,
            ..Config::default()
        };
        let mut session = ReviewSession::new(store, &config);

        let mut record = StoreRecord::default();
        record.insert_annotation(friday_annotation());

        let t0 = Instant::now();
        let live = session.check_page_at(&Document::parse(PAGE), &record, URL, t0);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].tier, Some(Tier::Path));
        assert_eq!(live[0].state, AnchorState::Anchored);

        let gone = Document::parse("<html><body><p>Nothing here.</p></body></html>");
        let first = session.check_page_at(&gone, &record, URL, t0);
        assert_eq!(first[0].tier, None);
        assert_eq!(first[0].state, AnchorState::Checking);
        let later = session.check_page_at(&gone, &record, URL, t0 + Duration::from_secs(2));
        assert_eq!(later[0].state, AnchorState::Orphaned);

        assert!(session.check_page_at(&gone, &record, "http://other/", t0).is_empty());
    }

    #[tokio::test]
    async fn store_change_restarts_grace_windows() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(dir.path().join("store.json")).unwrap();
        let config = Config {
            grace_period_ms: 1_000,
            ..Config::default()
        };
        let mut session = ReviewSession::new(store.clone(), &config);
        assert!(session.fingerprint().is_none());
        assert!(session.refresh().await.unwrap().is_none());
        let primed = session.fingerprint().cloned().unwrap();

        let mut record = StoreRecord::default();
        record.insert_annotation(friday_annotation());
        let gone = Document::parse("<html><body></body></html>");
        let t0 = Instant::now();
        session.check_page_at(&gone, &record, URL, t0);
        let late = t0 + Duration::from_secs(5);
        assert_eq!(
            session.check_page_at(&gone, &record, URL, late)[0].state,
            AnchorState::Orphaned
        );

        store
            .mutate(|mut r| {
                r.insert_page_note(PageNote::new(URL, "Plan", "external edit", Utc::now()));
                Ok(r)
            })
            .await
            .unwrap();
        assert!(session.refresh().await.unwrap().is_some());
        assert_ne!(session.fingerprint(), Some(&primed));
        assert_eq!(
            session.check_page_at(&gone, &record, URL, late)[0].state,
            AnchorState::Checking
        );
    }
}
