//! agora-server
//!
//! The HTTP surface: one axum route per registered command, mounted under
//! `/api/v1`, serving the same envelope the in-process facade returns.
//!
//! Routes are generated from the application's command map at startup.
//! Commands whose model has no installed provider are skipped entirely, so
//! they answer 404 instead of failing at dispatch time. Each route accepts
//! GET (query string, coerced against the merged query schema) and POST
//! (JSON object body). Errors map to `{detail, error_kind}` bodies with the
//! status code the error kind dictates; secrets never reach either channel.
#![warn(missing_docs)]

use std::sync::Arc;

use agora::{AgoraError, Application, CommandResult, ParamMap};
use agora_core::{ModelInterface, SemanticType};
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

/// Shared per-route state: the application plus the command path the route
/// was generated from.
#[derive(Clone)]
struct RouteState {
    app: Arc<Application>,
    path: String,
}

/// Error shape returned to HTTP callers.
struct ApiError(AgoraError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "detail": self.0.to_string(),
            "error_kind": self.0.error_kind(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<AgoraError> for ApiError {
    fn from(err: AgoraError) -> Self {
        Self(err)
    }
}

/// Build the versioned router for an assembled application.
///
/// Behavior and trade-offs
/// -----------------------
/// The route set is frozen at build time from the command map, mirroring the
/// read-only registry: installing or removing a provider requires a restart.
/// CORS is wide open by default; deployments that need a tighter policy wrap
/// the returned router with their own layer stack.
#[must_use]
pub fn router(app: Arc<Application>) -> Router {
    let mut router = Router::new();
    for (path, command) in app.commands().iter() {
        // Zero-provider models are unreachable; leave them unrouted.
        if app.interface().get(&command.model).is_none() {
            tracing::debug!(path = %path, model = %command.model, "skipping unrouted command");
            continue;
        }
        let route = format!("/api/v1{}", path.trim_end_matches('/'));
        let state = RouteState {
            app: Arc::clone(&app),
            path: path.clone(),
        };
        router = router.route(
            &route,
            get(handle_get).post(handle_post).with_state(state),
        );
    }
    router.layer(CorsLayer::permissive())
}

async fn handle_get(
    State(state): State<RouteState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<CommandResult>, ApiError> {
    let params = parse_query(&state, raw.as_deref().unwrap_or(""))?;
    dispatch(&state, params).await
}

async fn handle_post(
    State(state): State<RouteState>,
    body: Option<Json<Value>>,
) -> Result<Json<CommandResult>, ApiError> {
    let params = match body {
        None | Some(Json(Value::Null)) => ParamMap::new(),
        Some(Json(Value::Object(map))) => map,
        Some(Json(other)) => {
            return Err(AgoraError::validation(format!(
                "request body must be a JSON object, got {}",
                value_kind(&other)
            ))
            .into());
        }
    };
    dispatch(&state, params).await
}

async fn dispatch(state: &RouteState, params: ParamMap) -> Result<Json<CommandResult>, ApiError> {
    let envelope = state.app.run(&state.path, params).await?;
    Ok(Json(envelope))
}

/// Decode a query string into typed parameters using the merged query
/// schema. Tokens for declared fields are coerced to the field's semantic
/// type; undeclared names pass through as strings and are rejected by the
/// dispatch validation with the caller's spelling intact.
fn parse_query(state: &RouteState, raw: &str) -> Result<ParamMap, AgoraError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
        .map_err(|err| AgoraError::validation(format!("malformed query string: {err}")))?;

    let command = state
        .app
        .commands()
        .get(&state.path)
        .ok_or_else(|| AgoraError::validation(format!("unknown command path {}", state.path)))?;
    let interface = state.app.interface().get(&command.model);

    let mut params = ParamMap::new();
    for (name, token) in pairs {
        let value = match name.as_str() {
            "provider" | "chart" => Value::String(token),
            "no_cache" => SemanticType::Bool.coerce_str(&name, &token)?,
            _ => match interface.and_then(|i| query_field_type(i, &name)) {
                Some(semantic) => semantic.coerce_str(&name, &token)?,
                None => Value::String(token),
            },
        };
        params.insert(name, value);
    }
    Ok(params)
}

fn query_field_type(interface: &ModelInterface, name: &str) -> Option<SemanticType> {
    interface
        .standard_query
        .field(name)
        .or_else(|| interface.extra_query.field(name))
        .map(|f| f.semantic_type)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
