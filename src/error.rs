//! Domain error taxonomy (spec §7).
//!
//! `AmonError` is the one error type that crosses every layer boundary in
//! this crate: the directory adapter maps the external service's failures
//! into it, the object-model validator raises it at construction time, the
//! authorizer raises it on a failed check, and the Master's HTTP layer maps
//! it onto a status code. Keeping one enum (rather than one per layer) is
//! what makes "propagate unchanged in kind" (spec §7) possible to write
//! honestly — there's no kind to lose in translation.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmonError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// §9's design note on cascading delete ("reject DELETE while child
    /// probes exist with `409 Constraint`") names this kind explicitly even
    /// though §7's table doesn't list it alongside the other four — it's
    /// the same HTTP status as `InvalidArgument` but a distinct `code` so
    /// clients can tell "your input was wrong" from "this would violate a
    /// referential invariant" apart.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl AmonError {
    /// `true` for the one kind the cache (§4.C) must never store.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AmonError::Unavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AmonError::MissingParameter(_) => StatusCode::CONFLICT,
            AmonError::InvalidArgument(_) => StatusCode::CONFLICT,
            AmonError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AmonError::Constraint(_) => StatusCode::CONFLICT,
            AmonError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AmonError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable `code` field for the `{ code, message }` error body (spec §6).
    pub fn code(&self) -> &'static str {
        match self {
            AmonError::MissingParameter(_) => "MissingParameter",
            AmonError::InvalidArgument(_) => "InvalidArgument",
            AmonError::ResourceNotFound(_) => "ResourceNotFound",
            AmonError::Constraint(_) => "Constraint",
            AmonError::Unavailable(_) => "Unavailable",
            AmonError::InternalError(_) => "InternalError",
        }
    }
}
