//! Pending registry (spec §4.3): a concurrent map from variant key to its
//! lifecycle entry, read by pollers and written by the façade and the
//! batch processor. A single mutex serializes mutations, mirroring the
//! teacher's `Arc<Mutex<..>>` shared-state convention
//! (`mmoldb-app::records_cache::RecordsCache`) rather than reaching for a
//! lock-free map the workload doesn't need.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::key::VariantKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    Queued,
    Processing,
    Completed,
    Failed,
    RetryAvailable,
}

impl PendingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PendingState::Completed | PendingState::Failed)
    }
}

/// Opaque handle to a persisted annotation. In this implementation it is
/// just the variant key, since the cache store is keyed by it; callers
/// never need to do anything with this besides hand it back to
/// `variant_db::db::get_annotation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRef(pub String);

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub variant_key: String,
    pub state: PendingState,
    pub attempts: u32,
    pub first_enqueued_at: Instant,
    pub last_transition_at: Instant,
    pub result_ref: Option<ResultRef>,
    pub failure_reason: Option<String>,
}

impl PendingEntry {
    fn new_queued(variant_key: String, attempts: u32) -> Self {
        let now = Instant::now();
        Self {
            variant_key,
            state: PendingState::Queued,
            attempts,
            first_enqueued_at: now,
            last_transition_at: now,
            result_ref: None,
            failure_reason: None,
        }
    }
}

#[derive(Default)]
pub struct PendingRegistry {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

/// What happened when the façade tried to submit a key (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDecision {
    /// A fresh `queued` entry was created — either none existed, the
    /// prior one was `retry_available` (attempts carried forward), or it
    /// was terminal and is being superseded. The caller must enqueue it.
    Enqueued,
    /// A `queued`/`processing` entry already existed; nothing changed.
    AlreadyPending,
}

impl PendingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomically decides whether a submission should (re)create a
    /// `queued` entry, under a single lock acquisition (spec §8's "no
    /// duplicate keys" batch invariant): a check-then-mutate split across
    /// two lock acquisitions would let two concurrent resubmissions of
    /// the same `retry_available` key both pass the check and both
    /// enqueue. Handles all three submission cases the façade needs —
    /// fresh, resubmission of `retry_available`, and resubmission of a
    /// terminal entry (spec §3: "terminal entries are evicted ... on next
    /// submission of the same key") — in one place.
    pub fn submit(&self, key: &VariantKey) -> SubmitDecision {
        let mut entries = self.entries.lock().expect("pending registry lock poisoned");
        let carried_attempts = match entries.get(key.as_str()) {
            None => Some(0),
            Some(entry) if entry.state == PendingState::RetryAvailable => Some(entry.attempts),
            Some(entry) if entry.state.is_terminal() => Some(0),
            Some(_queued_or_processing) => None,
        };

        match carried_attempts {
            Some(attempts) => {
                entries.insert(
                    key.as_str().to_string(),
                    PendingEntry::new_queued(key.as_str().to_string(), attempts),
                );
                SubmitDecision::Enqueued
            }
            None => SubmitDecision::AlreadyPending,
        }
    }

    pub fn get(&self, key: &str) -> Option<PendingEntry> {
        let entries = self.entries.lock().expect("pending registry lock poisoned");
        entries.get(key).cloned()
    }

    /// Moves an entry to a new state, optionally bumping `attempts` and
    /// attaching a result handle or failure reason. No-op (does nothing
    /// and returns false) if the entry is gone — it may have been evicted
    /// by a concurrent sweep or resubmission.
    pub fn transition(
        &self,
        key: &str,
        new_state: PendingState,
        attempts_delta: u32,
        result_ref: Option<ResultRef>,
        failure_reason: Option<String>,
    ) -> bool {
        let mut entries = self.entries.lock().expect("pending registry lock poisoned");
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.state = new_state;
        entry.attempts += attempts_delta;
        entry.last_transition_at = Instant::now();
        if result_ref.is_some() {
            entry.result_ref = result_ref;
        }
        if failure_reason.is_some() {
            entry.failure_reason = failure_reason;
        }
        true
    }

    /// Evicts terminal entries older than `older_than`, so pollers get
    /// one grace window to observe the final state (spec §3: "leaves the
    /// registry either on terminal completed/failed after a grace
    /// period... or on explicit resubmission").
    pub fn sweep_terminal(&self, older_than: Duration) -> usize {
        let mut entries = self.entries.lock().expect("pending registry lock poisoned");
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| {
            !(entry.state.is_terminal() && now.duration_since(entry.last_transition_at) >= older_than)
        });
        before - entries.len()
    }

    /// Snapshot counts by state, used by the `/statistics` endpoint (spec
    /// §6: "queued, processing, completed-last-interval").
    pub fn counts(&self) -> RegistryCounts {
        let entries = self.entries.lock().expect("pending registry lock poisoned");
        let mut counts = RegistryCounts::default();
        for entry in entries.values() {
            match entry.state {
                PendingState::Queued => counts.queued += 1,
                PendingState::Processing => counts.processing += 1,
                PendingState::Completed => counts.completed += 1,
                PendingState::Failed => counts.failed += 1,
                PendingState::RetryAvailable => counts.retry_available += 1,
            }
        }
        counts
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("pending registry lock poisoned").len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegistryCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub retry_available: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_submits_of_the_same_key_coalesce() {
        let registry = PendingRegistry::new();
        let key = VariantKey::new_for_test("1:1:A>T");

        assert_eq!(registry.submit(&key), SubmitDecision::Enqueued);
        assert_eq!(registry.submit(&key), SubmitDecision::AlreadyPending);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn transition_updates_state_and_attempts() {
        let registry = PendingRegistry::new();
        let key = VariantKey::new_for_test("1:1:A>T");
        registry.submit(&key);

        assert!(registry.transition(key.as_str(), PendingState::Processing, 0, None, None));
        assert_eq!(registry.get(key.as_str()).unwrap().state, PendingState::Processing);

        assert!(registry.transition(
            key.as_str(),
            PendingState::RetryAvailable,
            1,
            None,
            Some("transient_upstream".to_string()),
        ));
        let entry = registry.get(key.as_str()).unwrap();
        assert_eq!(entry.state, PendingState::RetryAvailable);
        assert_eq!(entry.attempts, 1);
    }

    #[test]
    fn sweep_terminal_evicts_only_old_terminal_entries() {
        let registry = PendingRegistry::new();
        let completed = VariantKey::new_for_test("1:1:A>T");
        let queued = VariantKey::new_for_test("1:2:A>T");

        registry.submit(&completed);
        registry.transition(completed.as_str(), PendingState::Completed, 0, None, None);
        registry.submit(&queued);

        assert_eq!(registry.sweep_terminal(Duration::from_secs(0)), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(queued.as_str()).unwrap().state, PendingState::Queued);
    }

    #[test]
    fn resubmission_of_a_retry_available_key_carries_attempts_forward() {
        let registry = PendingRegistry::new();
        let key = VariantKey::new_for_test("1:1:A>T");
        registry.submit(&key);
        registry.transition(key.as_str(), PendingState::RetryAvailable, 2, None, None);

        assert_eq!(registry.submit(&key), SubmitDecision::Enqueued);

        let entry = registry.get(key.as_str()).unwrap();
        assert_eq!(entry.state, PendingState::Queued);
        assert_eq!(entry.attempts, 2);
    }

    #[test]
    fn resubmission_of_a_terminal_key_resets_attempts_and_re_enqueues() {
        let registry = PendingRegistry::new();
        let key = VariantKey::new_for_test("1:1:A>T");
        registry.submit(&key);
        registry.transition(key.as_str(), PendingState::Failed, 3, None, Some("no_annotation_returned".to_string()));

        assert_eq!(registry.submit(&key), SubmitDecision::Enqueued);

        let entry = registry.get(key.as_str()).unwrap();
        assert_eq!(entry.state, PendingState::Queued);
        assert_eq!(entry.attempts, 0);
    }

    #[test]
    fn submitting_a_queued_or_processing_key_is_a_no_op() {
        let registry = PendingRegistry::new();
        let key = VariantKey::new_for_test("1:1:A>T");
        registry.submit(&key);
        registry.transition(key.as_str(), PendingState::Processing, 0, None, None);

        assert_eq!(registry.submit(&key), SubmitDecision::AlreadyPending);
        assert_eq!(registry.get(key.as_str()).unwrap().state, PendingState::Processing);
    }

    #[test]
    fn counts_tallies_entries_by_state() {
        let registry = PendingRegistry::new();
        let queued = VariantKey::new_for_test("1:1:A>T");
        let processing = VariantKey::new_for_test("1:2:A>T");

        registry.submit(&queued);
        registry.submit(&processing);
        registry.transition(processing.as_str(), PendingState::Processing, 0, None, None);

        let counts = registry.counts();
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.completed, 0);
    }
}
