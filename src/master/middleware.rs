//! Session resolution for the `/pub/:login/...` surface (spec §4.C: "Monitor
//! and Contact PUTs currently require only a valid session for the :login
//! in the route (the owning account equals the session account)").
//!
//! The real session mechanism (cookie/portal SSO) is external to this
//! core per spec §1; what the core needs is just "which account issued
//! this request", so this middleware resolves a bearer token to an
//! account login via `AccountService` and stores it as a request
//! extension, the same shape the teacher's `middleware::auth::validate_token`
//! uses for its single shared deploy token, generalized to per-account
//! identity instead of one shared secret.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::error::AmonError;
use crate::master::state::AppState;

/// The account that issued the current request, resolved once per request
/// and handed to downstream extractors via `req.extensions()`.
#[derive(Debug, Clone)]
pub struct SessionAccount {
    pub login: String,
    pub uuid: String,
}

/// Resolves the `Authorization: Bearer <login>` header to a `SessionAccount`
/// via `AccountService::resolve_login`, rejecting the request with the same
/// `AmonError` the rest of the API uses for "no such account" (spec §7
/// propagates authorization failures as `InvalidArgument`, never a bare
/// 401/403, to avoid leaking resource existence).
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AmonError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let login = match header_value.as_deref() {
        Some(v) if v.starts_with("Bearer ") => v[7..].to_string(),
        _ => {
            return Err(AmonError::InvalidArgument(
                "missing or malformed Authorization header".to_string(),
            ))
        }
    };

    let uuid = state.accounts.resolve_login(&login).await?;
    req.extensions_mut().insert(SessionAccount { login, uuid });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_account_carries_login_and_uuid() {
        let session = SessionAccount {
            login: "alice".to_string(),
            uuid: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
        };
        assert_eq!(session.login, "alice");
    }
}
