use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{get, State};
use serde::Serialize;

use variant_core::{PendingRegistry, PendingState};
use variant_db::models::DbVariantAnnotation;
use variant_db::ConnectionPool;

use crate::api::error::ApiError;

#[derive(Serialize)]
pub struct PollResponse {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<DbVariantAnnotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Clients observing `retry_available` are expected to resubmit (spec
/// §6): polling never mutates the registry itself.
#[get("/poll/<variant_key>")]
pub async fn poll(
    variant_key: String,
    registry: &State<Arc<PendingRegistry>>,
    pool: &State<ConnectionPool>,
) -> Result<Json<PollResponse>, ApiError> {
    let registry = Arc::clone(registry.inner());
    let pool = pool.inner().clone();

    let response = rocket::tokio::task::spawn_blocking(move || -> Result<PollResponse, ApiError> {
        if let Some(entry) = registry.get(&variant_key) {
            // A `completed` entry still sits in the registry until the next
            // sweep; the record itself already lives in the cache store, so
            // fetch it rather than reporting `completed` with no record
            // (the Completed state always implies a successful write, per
            // the store's own cache-hit invariant).
            let record = if entry.state == PendingState::Completed {
                let mut conn = pool.get().map_err(|_| ApiError::from(variant_core::SubmitError::ServiceUnavailable))?;
                variant_db::db::get_annotation(&mut conn, &variant_key)?.map(|stored| stored.variant)
            } else {
                None
            };

            return Ok(PollResponse {
                state: state_label(entry.state),
                record,
                attempts: Some(entry.attempts),
                failure_reason: entry.failure_reason,
            });
        }

        let mut conn = pool.get().map_err(|_| ApiError::from(variant_core::SubmitError::ServiceUnavailable))?;
        match variant_db::db::get_annotation(&mut conn, &variant_key)? {
            Some(stored) => Ok(PollResponse {
                state: "completed",
                record: Some(stored.variant),
                attempts: None,
                failure_reason: None,
            }),
            None => Ok(PollResponse {
                state: "not_found",
                record: None,
                attempts: None,
                failure_reason: None,
            }),
        }
    })
    .await
    .expect("poll task panicked")?;

    Ok(Json(response))
}

fn state_label(state: variant_core::PendingState) -> &'static str {
    use variant_core::PendingState::*;
    match state {
        Queued | Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        RetryAvailable => "retry_available",
    }
}
