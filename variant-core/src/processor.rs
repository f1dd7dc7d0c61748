//! Batch processor (spec §4.2): owns the queue, the flush trigger, the
//! bounded worker pool, and the per-batch pipeline. The dispatcher loop
//! races "batch full" against "timer fired" via `tokio::select!`, the same
//! shape as the teacher's stream-vs-abort race in
//! `mmoldb-ingest::ingest_games::ingest_games`; the worker pool is bounded
//! with a `Semaphore` rather than the teacher's `max_workers`-many spawned
//! tasks, since batches here arrive at an unpredictable rate rather than
//! from one finite stream.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::warn;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use variant_db::db::{write_batch, AnnotatedVariant};
use variant_db::ConnectionPool;
use vep_client::{VepClient, VepVariantQuery};

use crate::config::BatchConfig;
use crate::error::{BatchFailure, FailureReason};
use crate::key::VariantKey;
use crate::parser::{parse_batch, ParseFailure};
use crate::registry::{PendingRegistry, PendingState, ResultRef};
use crate::scorer::{extract_features, PathogenicityScorer};

#[derive(Default)]
struct Queue {
    inner: Mutex<VecDeque<(VariantKey, Instant)>>,
    notify: Notify,
}

impl Queue {
    fn push(&self, key: VariantKey) {
        self.inner.lock().expect("queue lock poisoned").push_back((key, Instant::now()));
        self.notify.notify_one();
    }

    fn drain_all(&self) -> Vec<VariantKey> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .drain(..)
            .map(|(key, _)| key)
            .collect()
    }
}

pub struct BatchProcessor {
    queue: Queue,
    registry: Arc<PendingRegistry>,
    pool: ConnectionPool,
    vep_client: Arc<VepClient>,
    scorer: Arc<dyn PathogenicityScorer>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(
        pool: ConnectionPool,
        vep_client: VepClient,
        scorer: Arc<dyn PathogenicityScorer>,
        registry: Arc<PendingRegistry>,
        config: BatchConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue: Queue::default(),
            registry,
            pool,
            vep_client: Arc::new(vep_client),
            scorer,
            workers: Arc::new(Semaphore::new(config.max_workers)),
            shutdown: CancellationToken::new(),
            config,
        })
    }

    /// Pushes a key onto the FIFO queue (spec §4.2: "the queue is bounded
    /// only implicitly by downstream pressure"). Called by the façade
    /// after a fresh `queued` registry entry has been created.
    pub fn enqueue(&self, key: VariantKey) {
        self.queue.push(key);
    }

    /// Cloned into the façade so it can reject submissions with
    /// `service_unavailable` once shutdown has been requested (spec §4.2:
    /// "submissions arriving during shutdown are rejected").
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The dispatcher loop. Runs until `shutdown_token().cancel()` is
    /// called, at which point it drains whatever remains into one final
    /// batch, processes it to completion, and returns. Alongside batch
    /// dispatch, a periodic tick evicts terminal registry entries past
    /// their grace period (spec §3: "leaves the registry either on
    /// terminal completed/failed after a grace period ... or on explicit
    /// resubmission") — without this, `sweep_terminal` is never called and
    /// the registry grows unboundedly.
    pub async fn run(self: Arc<Self>) {
        let mut sweep_interval = tokio::time::interval(self.config.terminal_retention());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let final_batch = self.queue.drain_all();
                    if !final_batch.is_empty() {
                        process_batch(
                            &final_batch,
                            &self.registry,
                            &self.pool,
                            &self.vep_client,
                            self.scorer.as_ref(),
                            &self.config,
                        )
                        .await;
                    }
                    break;
                }
                batch = self.next_batch() => {
                    if !batch.is_empty() {
                        self.dispatch(batch);
                    }
                }
                _ = sweep_interval.tick() => {
                    self.registry.sweep_terminal(self.config.terminal_retention());
                }
            }
        }
    }

    /// Blocks until either the queue has reached `max_batch_size`, or its
    /// oldest member has waited `max_wait_time` (spec §4.2 flush trigger).
    async fn next_batch(&self) -> Vec<VariantKey> {
        loop {
            let wait_until = {
                let mut entries = self.queue.inner.lock().expect("queue lock poisoned");
                if entries.len() >= self.config.max_batch_size {
                    return entries
                        .drain(..self.config.max_batch_size)
                        .map(|(key, _)| key)
                        .collect();
                }
                match entries.front() {
                    Some((_, enqueued_at)) => {
                        let deadline = *enqueued_at + self.config.max_wait_time();
                        if Instant::now() >= deadline {
                            let n = entries.len();
                            return entries.drain(..n).map(|(key, _)| key).collect();
                        }
                        Some(deadline)
                    }
                    None => None,
                }
            };

            match wait_until {
                Some(deadline) => {
                    tokio::select! {
                        _ = self.queue.notify.notified() => {}
                        _ = tokio::time::sleep_until(deadline.into()) => {}
                    }
                }
                None => self.queue.notify.notified().await,
            }
        }
    }

    /// Hands a formed batch to the worker pool without blocking the
    /// dispatcher on worker availability: if all workers are busy the
    /// batch waits on the semaphore inside the spawned task (spec §4.2:
    /// "the batch waits in a handoff channel (not the queue); new
    /// submissions may continue to accumulate a fresh batch meanwhile").
    fn dispatch(&self, batch: Vec<VariantKey>) {
        let workers = self.workers.clone();
        let registry = self.registry.clone();
        let pool = self.pool.clone();
        let vep_client = self.vep_client.clone();
        let scorer = self.scorer.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .expect("worker semaphore closed");
            process_batch(&batch, &registry, &pool, &vep_client, scorer.as_ref(), &config).await;
        });
    }
}

fn to_vep_query(key: &VariantKey) -> VepVariantQuery {
    let raw = key.as_str();
    let (locus, alleles) = raw
        .rsplit_once(':')
        .expect("variant key always has a position segment");
    let (_reference, alt) = alleles
        .split_once('>')
        .expect("variant key always has a ref>alt segment");

    VepVariantQuery {
        region: locus.to_string(),
        allele: alt.to_string(),
        tag: raw.to_string(),
    }
}

/// Bumps `attempts` and transitions to `retry_available` (below
/// `max_retries`) or terminally `failed`, per spec §3's lifecycle rule.
/// `failure` is one of the whole-batch kinds (spec §7: `transient_upstream`,
/// `persist_error`) that consume one attempt per batch member rather than
/// failing them outright.
fn fail_one(registry: &PendingRegistry, key: &str, config: &BatchConfig, failure: &BatchFailure) {
    let reason = failure.to_string();
    if !failure.is_retriable() {
        registry.transition(key, PendingState::Failed, 1, None, Some(reason));
        return;
    }

    let attempts_after = registry.get(key).map_or(1, |entry| entry.attempts + 1);
    let next_state = if attempts_after < config.max_retries {
        PendingState::RetryAvailable
    } else {
        PendingState::Failed
    };
    registry.transition(key, next_state, 1, None, Some(reason));
}

fn fail_whole_batch<'a>(
    keys: impl Iterator<Item = &'a str>,
    registry: &PendingRegistry,
    config: &BatchConfig,
    failure: &BatchFailure,
) {
    for key in keys {
        fail_one(registry, key, config, failure);
    }
}

/// The per-batch pipeline (spec §4.2 steps 1-6), as a free function so it
/// can be exercised directly in tests against fakes, without going through
/// the dispatcher's queueing and timing machinery.
async fn process_batch(
    batch: &[VariantKey],
    registry: &PendingRegistry,
    pool: &ConnectionPool,
    vep_client: &VepClient,
    scorer: &dyn PathogenicityScorer,
    config: &BatchConfig,
) {
    if batch.is_empty() {
        return;
    }

    // 1. Mark.
    for key in batch {
        registry.transition(key.as_str(), PendingState::Processing, 0, None, None);
    }

    // 2. Call VEP. The whole batch is all-or-nothing.
    let queries: Vec<VepVariantQuery> = batch.iter().map(to_vep_query).collect();
    let items = match vep_client.annotate_batch(&queries, config.vep_timeout()).await {
        Ok(items) => items,
        Err(err) => {
            warn!("VEP call failed for a batch of {}: {err}", batch.len());
            let failure = BatchFailure::TransientUpstream(err);
            fail_whole_batch(batch.iter().map(VariantKey::as_str), registry, config, &failure);
            return;
        }
    };

    // 3. Parse. A malformed entry must not poison the rest of the batch.
    let parsed = parse_batch(batch, items);

    let mut to_persist = Vec::with_capacity(batch.len());
    for key in batch {
        match parsed.get(key.as_str()) {
            Some(Ok((record, transcripts))) => {
                // 4. Score.
                let features = extract_features(record, transcripts);
                let mut record = record.clone();
                record.ml_pathogenicity_score = scorer.score(&features);
                to_persist.push(AnnotatedVariant {
                    record,
                    transcripts: transcripts.clone(),
                });
            }
            Some(Err(ParseFailure::NoAnnotationReturned)) | None => {
                registry.transition(
                    key.as_str(),
                    PendingState::Failed,
                    0,
                    None,
                    Some(FailureReason::NoAnnotationReturned.to_string()),
                );
            }
            Some(Err(ParseFailure::ParseError(message))) => {
                registry.transition(
                    key.as_str(),
                    PendingState::Failed,
                    0,
                    None,
                    Some(FailureReason::ParseError(message.clone()).to_string()),
                );
            }
        }
    }

    if to_persist.is_empty() {
        return;
    }

    // 5. Persist, in a single transaction per batch.
    let persisted_keys: Vec<String> = to_persist
        .iter()
        .map(|item| item.record.variant_key.clone())
        .collect();

    let mut conn = match pool.get() {
        Ok(conn) => conn,
        Err(err) => {
            warn!("failed to obtain a connection to persist a batch: {err}");
            let failure = BatchFailure::ConnectionUnavailable(err);
            fail_whole_batch(persisted_keys.iter().map(String::as_str), registry, config, &failure);
            return;
        }
    };

    // 6. Publish.
    match write_batch(&mut conn, &to_persist) {
        Ok(()) => {
            for key in &persisted_keys {
                registry.transition(
                    key,
                    PendingState::Completed,
                    0,
                    Some(ResultRef(key.clone())),
                    None,
                );
            }
        }
        Err(err) => {
            warn!("batch persist failed: {err}");
            let failure = BatchFailure::PersistError(err);
            fail_whole_batch(persisted_keys.iter().map(String::as_str), registry, config, &failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vep_query_splits_region_and_alt_allele_out_of_the_canonical_key() {
        let key = VariantKey::new_for_test("7:140453136:A>T");
        let query = to_vep_query(&key);
        assert_eq!(query.region, "7:140453136");
        assert_eq!(query.allele, "T");
        assert_eq!(query.tag, "7:140453136:A>T");
    }

    #[test]
    fn fail_one_transitions_to_retry_available_below_max_retries() {
        let registry = PendingRegistry::new();
        let key = VariantKey::new_for_test("1:1:A>T");
        registry.submit(&key);

        let config = BatchConfig {
            max_retries: 3,
            ..BatchConfig::default()
        };
        let failure = BatchFailure::TransientUpstream(vep_client::VepClientError::Timeout);
        fail_one(&registry, key.as_str(), &config, &failure);

        let entry = registry.get(key.as_str()).unwrap();
        assert_eq!(entry.state, PendingState::RetryAvailable);
        assert_eq!(entry.attempts, 1);
    }

    #[test]
    fn fail_one_reaches_failed_at_max_retries() {
        let registry = PendingRegistry::new();
        let key = VariantKey::new_for_test("1:1:A>T");
        registry.submit(&key);
        registry.transition(key.as_str(), PendingState::RetryAvailable, 2, None, None);

        let config = BatchConfig {
            max_retries: 3,
            ..BatchConfig::default()
        };
        let failure = BatchFailure::TransientUpstream(vep_client::VepClientError::Timeout);
        fail_one(&registry, key.as_str(), &config, &failure);

        let entry = registry.get(key.as_str()).unwrap();
        assert_eq!(entry.state, PendingState::Failed);
        assert_eq!(entry.attempts, 3);
    }

    #[tokio::test]
    async fn queue_push_then_drain_all_preserves_fifo_order() {
        let queue = Queue::default();
        queue.push(VariantKey::new_for_test("1:1:A>T"));
        queue.push(VariantKey::new_for_test("1:2:A>T"));

        let drained = queue.drain_all();
        assert_eq!(drained[0].as_str(), "1:1:A>T");
        assert_eq!(drained[1].as_str(), "1:2:A>T");
    }
}
