//! Orphan tracking: how confidently an annotation is anchored right now.
//!
//! An annotation without a live anchor is not declared orphaned at once.
//! The page may still be rendering or an agent may be rewriting the text, so
//! it first reports `Checking` for a grace period measured from the first
//! unanchored observation. The tracker holds only that timestamp per
//! annotation and lives for one session; it is never persisted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::AnnotationStatus;

/// Default grace period before an unanchored annotation is orphaned.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(15);

/// Confidence label shown for an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorState {
    Anchored,
    Checking,
    Orphaned,
}

impl AnchorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anchored => "anchored",
            Self::Checking => "checking",
            Self::Orphaned => "orphaned",
        }
    }
}

impl std::fmt::Display for AnchorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct OrphanTracker {
    grace_period: Duration,
    first_unanchored: HashMap<String, Instant>,
}

impl Default for OrphanTracker {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl OrphanTracker {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            first_unanchored: HashMap::new(),
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// State for `id` given the latest anchoring outcome, measured now.
    pub fn get_state(&mut self, id: &str, anchored: bool, status: AnnotationStatus) -> AnchorState {
        self.get_state_at(id, anchored, status, Instant::now())
    }

    /// State for `id` given the latest anchoring outcome, measured at `now`.
    pub fn get_state_at(
        &mut self,
        id: &str,
        anchored: bool,
        status: AnnotationStatus,
        now: Instant,
    ) -> AnchorState {
        if anchored {
            self.first_unanchored.remove(id);
            return AnchorState::Anchored;
        }

        // An agent working on the annotation is never shown as orphaned, and
        // its grace window restarts once the agent hands it back.
        if status == AnnotationStatus::InProgress {
            self.first_unanchored.remove(id);
            return AnchorState::Checking;
        }

        let since = *self
            .first_unanchored
            .entry(id.to_string())
            .or_insert(now);
        if now.saturating_duration_since(since) < self.grace_period {
            AnchorState::Checking
        } else {
            AnchorState::Orphaned
        }
    }

    /// Forget every timestamp, giving all annotations a fresh grace window.
    /// Call whenever the store is known to have changed externally.
    pub fn reset(&mut self) {
        self.first_unanchored.clear();
    }

    /// Number of annotations currently inside or past a grace window.
    pub fn tracked(&self) -> usize {
        self.first_unanchored.len()
    }
}
