//! Submission façade (spec §4.1): the thin entry point an HTTP handler
//! calls. Checks the cache, then the pending registry, then enqueues —
//! never leaving partial state behind on an error path.

use std::sync::Arc;

use log::debug;
use variant_db::models::DbVariantAnnotation;
use variant_db::ConnectionPool;

use crate::error::SubmitError;
use crate::key::VariantKey;
use crate::processor::BatchProcessor;
use crate::registry::{PendingRegistry, SubmitDecision};

/// What `submit` reports back to the caller, per spec §4.1.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// A variant-level row already existed; nothing was enqueued.
    Cached(DbVariantAnnotation),
    /// A fresh `queued` entry was created and pushed onto the queue.
    Accepted,
    /// An entry for this key was already pending; nothing changed.
    AlreadyPending,
}

pub struct Facade {
    pool: ConnectionPool,
    registry: Arc<PendingRegistry>,
    processor: Arc<BatchProcessor>,
}

impl Facade {
    pub fn new(pool: ConnectionPool, registry: Arc<PendingRegistry>, processor: Arc<BatchProcessor>) -> Self {
        Self {
            pool,
            registry,
            processor,
        }
    }

    /// Spec §4.1 steps 1-3, plus the resubmission path folded into the
    /// same entry point (spec §3: "terminal entries are evicted ... on
    /// next submission of the same key"; spec §4.2 retry semantics: a
    /// resubmission of a `retry_available` key carries its attempt count
    /// forward). Validation of the raw request shape (the `invalid_input`
    /// path) happens before this is called, via `VariantRequest::normalize`
    /// — by the time a `VariantKey` reaches here it is already known-valid.
    ///
    /// The registry-side decision (fresh vs. retry-carry-forward vs.
    /// terminal-supersede vs. already-pending) is made atomically inside
    /// `PendingRegistry::submit` — not as a separate get-then-mutate here
    /// — so two concurrent resubmissions of the same key can't both
    /// observe `retry_available` and both enqueue (spec §8: no duplicate
    /// keys in a batch).
    pub fn submit(&self, key: VariantKey) -> Result<SubmitOutcome, SubmitError> {
        if self.processor.shutdown_token().is_cancelled() {
            return Err(SubmitError::ServiceUnavailable);
        }

        let mut conn = self.pool.get().map_err(|_| SubmitError::ServiceUnavailable)?;
        if let Some(stored) = variant_db::db::get_annotation(&mut conn, key.as_str())
            .map_err(SubmitError::StoreUnreachable)?
        {
            debug!("submit: cache hit for {key}");
            return Ok(SubmitOutcome::Cached(stored.variant));
        }
        drop(conn);

        match self.registry.submit(&key) {
            SubmitDecision::Enqueued => {
                self.processor.enqueue(key);
                Ok(SubmitOutcome::Accepted)
            }
            SubmitDecision::AlreadyPending => Ok(SubmitOutcome::AlreadyPending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_variants_are_distinguishable() {
        let cached = SubmitOutcome::AlreadyPending;
        assert!(matches!(cached, SubmitOutcome::AlreadyPending));
    }
}
