use log::error;
use miette::Diagnostic;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, Response};
use serde::Serialize;
use thiserror::Error;

use variant_core::{InvalidVariant, SubmitError};

#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidVariant),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Store(#[from] variant_db::QueryError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::InvalidInput(_) => Status::BadRequest,
            ApiError::Submit(SubmitError::InvalidInput(_)) => Status::BadRequest,
            ApiError::Submit(SubmitError::ServiceUnavailable) => Status::ServiceUnavailable,
            ApiError::Submit(SubmitError::StoreUnreachable(_)) => Status::ServiceUnavailable,
            ApiError::Store(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'o> {
        if matches!(self.status(), Status::InternalServerError | Status::ServiceUnavailable) {
            error!("api error: {self}");
        }

        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        Response::build_from(body.respond_to(request)?)
            .status(self.status())
            .ok()
    }
}
