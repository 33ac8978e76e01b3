//! HTTP error responder, generalized from the teacher's `routes/error.rs`
//! `ProblemDetails` — here keyed to Amon's `{ code, message }` error body
//! (spec §6) rather than RFC 9457, since the spec pins the exact shape.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

use crate::error::AmonError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AmonError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %body.message, "internal error serving request");
        }
        (status, Json(body)).into_response()
    }
}
