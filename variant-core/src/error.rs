use miette::Diagnostic;
use thiserror::Error;

use crate::key::InvalidVariant;

/// Result of `submit` (spec §4.1). Errors here are the only ones a
/// caller of the façade observes synchronously; everything else
/// manifests later, through polling.
#[derive(Debug, Error, Diagnostic)]
pub enum SubmitError {
    #[error("invalid variant: {0}")]
    InvalidInput(#[from] InvalidVariant),

    #[error("service is unavailable")]
    ServiceUnavailable,

    #[error("cache store unreachable")]
    StoreUnreachable(#[source] variant_db::QueryError),
}

/// Non-retriable, per-variant reason a batch member ends in `failed`
/// (spec §7).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("VEP returned no usable content for this variant")]
    NoAnnotationReturned,
    #[error("malformed per-variant payload: {0}")]
    ParseError(String),
    #[error("{0} transient attempt(s) failed; retries exhausted")]
    RetriesExhausted(u32),
}

/// Whole-batch failures that consume one attempt per member and lead to
/// `retry_available` (until attempts are exhausted) or a terminal
/// `failed` for `persist_error`/`transient_upstream` convergence (spec §7).
#[derive(Debug, Error, Diagnostic)]
pub enum BatchFailure {
    #[error("transient upstream failure calling VEP")]
    TransientUpstream(#[source] vep_client::VepClientError),

    #[error("no database connection was available to persist this batch")]
    ConnectionUnavailable(#[source] variant_db::PoolError),

    #[error("database transaction failed persisting this batch")]
    PersistError(#[source] variant_db::QueryError),
}

impl BatchFailure {
    /// Every whole-batch failure kind defined here is retriable by
    /// construction (spec §7: `transient_upstream` and `persist_error`
    /// are both "whole-batch; retriable").
    pub fn is_retriable(&self) -> bool {
        true
    }
}
