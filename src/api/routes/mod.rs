//! API routes module

pub mod accounts;
pub mod emails;
pub mod groups;
pub mod query;
pub mod rules;
pub mod tasks;

use std::sync::{Arc, RwLock};

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Credential check for the admin UI. The auth middleware has already
/// vetted the request by the time this handler runs.
async fn login() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/login", get(login).post(login))
        // Account routes
        .nest("/accounts", accounts::router())
        // Filter group routes
        .nest("/groups", groups::router())
        // Access rule routes
        .nest("/rules", rules::router())
        // Send task routes
        .nest("/tasks", tasks::router())
        // Live mailbox reads
        .nest("/emails", emails::router())
}
