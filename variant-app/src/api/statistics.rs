use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{get, State};
use serde::Serialize;

use variant_core::{PendingRegistry, RegistryCounts};
use variant_db::db::CacheStatistics;
use variant_db::ConnectionPool;

use crate::api::error::ApiError;

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub cache: CacheStatistics,
    pub pending: RegistryCounts,
}

/// Aggregated counts from the cache store and the registry (spec §6).
#[get("/statistics")]
pub async fn statistics(
    pool: &State<ConnectionPool>,
    registry: &State<Arc<PendingRegistry>>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let pool = pool.inner().clone();
    let cache = rocket::tokio::task::spawn_blocking(move || -> Result<CacheStatistics, ApiError> {
        let mut conn = pool.get().map_err(|_| ApiError::from(variant_core::SubmitError::ServiceUnavailable))?;
        Ok(variant_db::db::statistics(&mut conn)?)
    })
    .await
    .expect("statistics task panicked")?;

    Ok(Json(StatisticsResponse {
        cache,
        pending: registry.counts(),
    }))
}
