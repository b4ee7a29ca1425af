//! HTTP Basic authentication for the admin API

use std::sync::{Arc, RwLock};

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::{StatusCode, header};
use serde_json::json;

use super::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Reject any `/api` request whose Basic credentials don't match the
/// configured admin user
pub async fn require_admin(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let (username, password) = {
        let shared_state = state.read().unwrap();
        (
            shared_state.config.admin_username.clone(),
            shared_state.config.admin_password.clone(),
        )
    };

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_basic)
        .map(|(user, pass)| user == username && pass == password)
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response();
    }

    next.run(request).await
}

fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}
