use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{post, State};
use serde::{Deserialize, Serialize};

use variant_core::{Facade, SubmitOutcome, VariantRequest};
use variant_db::models::DbVariantAnnotation;

use crate::api::error::ApiError;

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub chrom: String,
    pub pos: i64,
    #[serde(rename = "ref")]
    pub reference: String,
    pub alt: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub state: &'static str,
    pub variant_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<DbVariantAnnotation>,
}

#[post("/submit", data = "<body>")]
pub async fn submit(
    body: Json<SubmitRequest>,
    facade: &State<Arc<Facade>>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let request = VariantRequest::normalize(&body.chrom, body.pos, &body.reference, &body.alt)?;
    let key = request.key();
    let variant_key = key.as_str().to_string();

    let facade = Arc::clone(facade.inner());
    let outcome = rocket::tokio::task::spawn_blocking(move || facade.submit(key))
        .await
        .expect("submit task panicked")?;

    let response = match outcome {
        SubmitOutcome::Cached(record) => SubmitResponse {
            state: "cached",
            variant_key,
            record: Some(record),
        },
        SubmitOutcome::Accepted => SubmitResponse {
            state: "accepted",
            variant_key,
            record: None,
        },
        SubmitOutcome::AlreadyPending => SubmitResponse {
            state: "already_pending",
            variant_key,
            record: None,
        },
    };

    Ok(Json(response))
}
