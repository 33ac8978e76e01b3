//! REST surface (spec §4.D, §6): the `/pub/:login/...` object-model CRUD,
//! `/ping`, the `/agentprobes` manifest feed relays poll, and `/events`
//! ingest. Every PUT here follows the same pipeline: merge route
//! parameters into the body (route wins for identity fields, body wins for
//! payload fields), validate via `model`, authorize via `authz`, persist
//! via `AppState` (which itself talks to `directory`).

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::authz::{self, authorize_probe_put};
use crate::master::dispatch;
use crate::master::error::ErrorBody;
use crate::master::middleware::{resolve_session, SessionAccount};
use crate::master::state::AppState;
use crate::model::contact::ContactPublicForm;
use crate::model::monitor::MonitorPublicForm;
use crate::model::probe::ProbePublicForm;
use crate::model::{dn, Contact, Monitor, Probe};
use crate::wire::Event;

pub fn router(state: Arc<AppState>) -> Router {
    let pub_routes = Router::new()
        .route("/pub/:login", get(account_summary))
        .route("/pub/:login/contacts", get(list_contacts))
        .route(
            "/pub/:login/contacts/:contact",
            get(get_contact).put(put_contact).delete(delete_contact),
        )
        .route("/pub/:login/monitors", get(list_monitors))
        .route(
            "/pub/:login/monitors/:monitor",
            get(get_monitor).put(put_monitor).delete(delete_monitor).post(monitor_action),
        )
        .route("/pub/:login/monitors/:monitor/probes", get(list_probes))
        .route(
            "/pub/:login/monitors/:monitor/probes/:probe",
            get(get_probe).put(put_probe).delete(delete_probe),
        )
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), resolve_session));

    Router::new()
        .route("/ping", get(ping))
        .route("/agentprobes", get(agentprobes))
        .route("/events", post(post_events))
        .merge(pub_routes)
        .with_state(state)
}

/// Every `/pub/:login/...` handler scopes to the caller's own account —
/// the route's `:login` must name the session that authenticated the
/// request (spec §4.C: Monitor/Contact PUTs "require only a valid session
/// for the :login in the route"); Amon applies the same scoping to reads
/// and to Probe mutations for consistency across the whole `/pub` surface.
fn require_self(session: &SessionAccount, login: &str) -> Result<(), AmonError> {
    if session.login != login {
        return Err(AmonError::InvalidArgument(
            "session does not match :login in route".to_string(),
        ));
    }
    Ok(())
}

use crate::error::AmonError;

async fn ping() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn account_summary(
    Path(login): Path<String>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    let account_dn = dn::account_dn(&session.uuid);
    let is_operator = authz::is_operator(&*state.directory, &state.authz_cache, &session.uuid, &account_dn).await?;
    Ok(Json(json!({
        "login": session.login,
        "uuid": session.uuid,
        "isOperator": is_operator,
    })))
}

// ---- Contacts ----

async fn list_contacts(
    Path(login): Path<String>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Vec<Value>>, AmonError> {
    require_self(&session, &login)?;
    let contacts = state.list_contacts(&session.uuid).await?;
    Ok(Json(contacts.iter().map(Contact::serialize).collect()))
}

async fn get_contact(
    Path((login, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    let contact = state.get_contact(&session.uuid, &name).await?;
    Ok(Json(contact.serialize()))
}

async fn put_contact(
    Path((login, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    merge_identity(&mut body, &[("name", &name), ("user", &session.uuid)])?;
    let form: ContactPublicForm =
        serde_json::from_value(body).map_err(|e| AmonError::InvalidArgument(e.to_string()))?;
    let contact = Contact::from_public(form)?;
    state.put_contact(&contact).await?;
    Ok(Json(contact.serialize()))
}

async fn delete_contact(
    Path((login, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<StatusCode, AmonError> {
    require_self(&session, &login)?;
    state.delete_contact(&session.uuid, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Monitors ----

async fn list_monitors(
    Path(login): Path<String>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Vec<Value>>, AmonError> {
    require_self(&session, &login)?;
    let monitors = state.list_monitors(&session.uuid).await?;
    Ok(Json(monitors.iter().map(Monitor::serialize).collect()))
}

async fn get_monitor(
    Path((login, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    let monitor = state.get_monitor(&session.uuid, &name).await?;
    Ok(Json(monitor.serialize()))
}

async fn put_monitor(
    Path((login, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    merge_identity(&mut body, &[("name", &name), ("user", &session.uuid)])?;
    let form: MonitorPublicForm =
        serde_json::from_value(body).map_err(|e| AmonError::InvalidArgument(e.to_string()))?;
    let monitor = Monitor::from_public(form)?;
    state.put_monitor(&monitor).await?;
    Ok(Json(monitor.serialize()))
}

async fn delete_monitor(
    Path((login, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<StatusCode, AmonError> {
    require_self(&session, &login)?;
    state.delete_monitor(&session.uuid, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct MonitorActionQuery {
    action: Option<String>,
    #[serde(default)]
    clear: bool,
}

/// `POST /pub/:login/monitors/:name?action=fakefault[&clear=true]` — spec
/// §4.D / §8 scenario 6: dispatches a synthetic event through the same
/// dispatch path a real probe event takes.
async fn monitor_action(
    Path((login, name)): Path<(String, String)>,
    Query(query): Query<MonitorActionQuery>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    match query.action.as_deref() {
        Some("fakefault") => {
            state.get_monitor(&session.uuid, &name).await?;
            let event = dispatch::fake_fault_event(&session.uuid, &name, query.clear);
            dispatch::dispatch(&state, &event).await;
            Ok(Json(json!({ "success": true })))
        }
        _ => Err(AmonError::InvalidArgument(format!(
            "unsupported action: {:?}",
            query.action
        ))),
    }
}

// ---- Probes ----

async fn list_probes(
    Path((login, monitor)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Vec<Value>>, AmonError> {
    require_self(&session, &login)?;
    let probes = state.list_probes(&session.uuid, &monitor).await?;
    Ok(Json(probes.iter().map(|p| p.serialize(false)).collect()))
}

async fn get_probe(
    Path((login, monitor, name)): Path<(String, String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    let probe = state.get_probe(&session.uuid, &monitor, &name).await?;
    Ok(Json(probe.serialize(false)))
}

async fn put_probe(
    Path((login, monitor, name)): Path<(String, String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, AmonError> {
    require_self(&session, &login)?;
    merge_identity(
        &mut body,
        &[("name", &name), ("user", &session.uuid), ("monitor", &monitor)],
    )?;
    let form: ProbePublicForm =
        serde_json::from_value(body).map_err(|e| AmonError::InvalidArgument(e.to_string()))?;

    // Spec §3 invariant 3: the named Monitor must exist for the same user.
    state.get_monitor(&session.uuid, &form.monitor).await?;

    let probe = Probe::from_public(form.clone(), &state.probe_types)?;
    let account_dn = dn::account_dn(&session.uuid);
    authorize_probe_put(
        &*state.directory,
        &*state.mapi,
        &state.authz_cache,
        &session.uuid,
        &account_dn,
        &form,
        probe.global,
    )
    .await?;

    state.put_probe(&probe).await?;
    Ok(Json(probe.serialize(false)))
}

async fn delete_probe(
    Path((login, monitor, name)): Path<(String, String, String)>,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionAccount>,
) -> Result<StatusCode, AmonError> {
    require_self(&session, &login)?;
    let probe = state.get_probe(&session.uuid, &monitor, &name).await?;
    let account_dn = dn::account_dn(&session.uuid);
    authz::authorize_probe_delete(
        &*state.directory,
        &*state.mapi,
        &state.authz_cache,
        &session.uuid,
        &account_dn,
        &probe,
    )
    .await?;
    state.delete_probe(&session.uuid, &monitor, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Inserts route-derived identity fields into the PUT body, route wins
/// (spec §4.D: "route wins for identity fields; body wins for payload
/// fields").
fn merge_identity(body: &mut Value, fields: &[(&str, &str)]) -> Result<(), AmonError> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| AmonError::InvalidArgument("request body must be a json object".to_string()))?;
    for (key, value) in fields {
        obj.insert((*key).to_string(), json!(value));
    }
    Ok(())
}

// ---- Relay-facing manifest feed ----

#[derive(Debug, Deserialize)]
struct AgentProbesQuery {
    machine: Option<String>,
    server: Option<String>,
}

/// `GET|HEAD /agentprobes?(machine=…|server=…)` (spec §4.D, §6): what a
/// relay polls. axum's `get` router answers `HEAD` automatically by running
/// this handler and discarding the body, which already satisfies the
/// spec's `GET|HEAD` pairing without a second handler.
async fn agentprobes(
    Query(query): Query<AgentProbesQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AmonError> {
    let (attr, uuid) = match (&query.machine, &query.server) {
        (Some(m), None) => ("machine", m.as_str()),
        (None, Some(s)) => ("server", s.as_str()),
        _ => {
            return Err(AmonError::InvalidArgument(
                "exactly one of machine or server query parameter is required".to_string(),
            ))
        }
    };

    let probes = state.list_probes_for_target(attr, uuid).await?;
    let entries: Vec<Value> = probes.iter().map(|p| p.serialize(true)).collect();
    let body = serde_json::to_vec(&entries).map_err(|e| AmonError::InternalError(e.to_string()))?;
    let content_md5 = crate::wire::content_md5(&body);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header("Content-MD5", content_md5)
        .body(Body::from(body))
        .unwrap())
}

// ---- Event ingest ----

/// `POST /events` (spec §4.D, §6): events forwarded upstream by relays.
/// `v != 1` is rejected with a literal `400` (spec §6), not the `409` the
/// rest of this API's validation errors carry, so it's built directly
/// rather than through `AmonError`.
async fn post_events(State(state): State<Arc<AppState>>, Json(event): Json<Event>) -> Response {
    if !event.is_supported_version() {
        let body = ErrorBody {
            code: "InvalidArgument".to_string(),
            message: format!("unsupported event wire version: {}", event.v),
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    // Spec §4.E "idempotent on event.uuid": a replay within the
    // de-duplication window is accepted without running dispatch again.
    if state.mark_event_seen(&event.uuid) {
        dispatch::dispatch(&state, &event).await;
    }
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}
