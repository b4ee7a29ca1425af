//! Router for the live mailbox read API

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{Json, Router, extract::State, routing::get};
use axum_extra::extract::Query;

use super::public;
use crate::api::routes::accounts::db as accounts_db;
use crate::api::state::AppState;
use crate::transport::{self, FetchedEmail};

type SharedState = Arc<RwLock<AppState>>;

// Fetch the newest messages for an account straight off its transport
async fn list_emails(
    State(state): State<SharedState>,
    Query(params): Query<public::EmailListQuery>,
) -> Result<Json<Vec<FetchedEmail>>, crate::api::public::ApiError> {
    let Some(account_id) = params.account_id else {
        return Ok(Json(Vec::new()));
    };

    let (db, config) = {
        let shared_state = state.read().unwrap();
        (shared_state.db.clone(), shared_state.config.clone())
    };

    let account = accounts_db::get_account(&db, account_id)
        .await?
        .ok_or_else(|| anyhow!("Account not found"))?;

    let emails = transport::fetch_emails(
        &config,
        &account,
        params.limit,
        None,
        params.mode.as_deref(),
    )
    .await?;

    Ok(Json(emails))
}

/// Create the emails router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(list_emails))
}
