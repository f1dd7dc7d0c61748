use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, State};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use variant_db::ConnectionPool;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `{status: "ok"}` when the database is reachable and the worker loop is
/// live; `503` otherwise (spec §6).
#[get("/health")]
pub async fn health(
    pool: &State<ConnectionPool>,
    shutdown: &State<CancellationToken>,
) -> (Status, Json<HealthResponse>) {
    if shutdown.is_cancelled() {
        return (Status::ServiceUnavailable, Json(HealthResponse { status: "shutting_down" }));
    }

    let pool = pool.inner().clone();
    let reachable = rocket::tokio::task::spawn_blocking(move || pool.get().is_ok())
        .await
        .unwrap_or(false);

    if reachable {
        (Status::Ok, Json(HealthResponse { status: "ok" }))
    } else {
        (Status::ServiceUnavailable, Json(HealthResponse { status: "database_unreachable" }))
    }
}
