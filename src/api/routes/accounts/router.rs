//! Router for the accounts API

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{Json, Router, extract::State, routing::get};
use axum_extra::extract::Query;
use serde_json::{Value, json};

use super::db::{self, AccountRecord};
use super::public;
use crate::api::public::{OneOrMany, Page};
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Split an `api_config` blob into its three OAuth fields, falling back to
/// the explicit fields when no blob was sent
fn oauth_fields(item: &public::AccountPayload) -> (Option<String>, Option<String>, Option<String>) {
    if let Some(config) = &item.api_config {
        let mut parts = config.split(',').map(|part| {
            let part = part.trim();
            (!part.is_empty()).then(|| part.to_string())
        });
        (
            parts.next().flatten(),
            parts.next().flatten(),
            parts.next().flatten(),
        )
    } else {
        (
            item.client_id.clone(),
            item.client_secret.clone(),
            item.refresh_token.clone(),
        )
    }
}

fn record_from_payload(item: public::AccountPayload) -> AccountRecord {
    let kind = item.kind.clone().unwrap_or_else(|| "API".to_string());
    // API-only accounts never need a script URL, so don't store a stale one
    let script_url = if kind == "API" {
        String::new()
    } else {
        item.gas_url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| item.script_url.clone())
            .unwrap_or_default()
    };
    let (client_id, client_secret, refresh_token) = oauth_fields(&item);

    AccountRecord {
        name: item.name.unwrap_or_else(|| "Unknown".to_string()),
        email: item.email.unwrap_or_default(),
        alias: item.alias.unwrap_or_default(),
        kind,
        script_url,
        client_id,
        client_secret,
        refresh_token,
    }
}

// List accounts, or a trimmed/simple or full/export view
async fn list_accounts(
    State(state): State<SharedState>,
    Query(params): Query<public::AccountListQuery>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();

    match params.view.as_deref() {
        Some("simple") => {
            let data = db::list_accounts_simple(&db).await?;
            Ok(Json(json!({ "data": data })))
        }
        Some("export") => {
            let data = db::export_accounts(&db).await?;
            Ok(Json(json!({ "data": data })))
        }
        _ => {
            let (data, total) = db::list_accounts(&db, params.page, params.limit, params.q).await?;
            let page = Page::new(data, total, params.page, params.limit);
            Ok(Json(serde_json::to_value(page)?))
        }
    }
}

// Create one account or import a batch, skipping duplicates
async fn create_accounts(
    State(state): State<SharedState>,
    Json(payload): Json<OneOrMany<public::AccountPayload>>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();

    let mut imported = 0;
    let mut skipped: Vec<String> = Vec::new();

    for item in payload.into_vec() {
        let name = item.name.clone().unwrap_or_else(|| "Unknown".to_string());
        let email = item.email.clone().unwrap_or_default();

        if db::duplicate_exists(&db, name.clone(), email.clone()).await? {
            let label = if email.trim().is_empty() {
                "no email".to_string()
            } else {
                email
            };
            skipped.push(format!("{} ({})", name, label));
            continue;
        }

        db::insert_account(&db, record_from_payload(item)).await?;
        imported += 1;
    }

    Ok(Json(
        json!({ "ok": true, "imported": imported, "skipped": skipped }),
    ))
}

// Update an account, or just flip its status
async fn update_account(
    State(state): State<SharedState>,
    Json(payload): Json<public::AccountPayload>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    let id = payload.id.ok_or_else(|| anyhow!("Missing account id"))?;

    // A body with a status but no name is a status toggle
    if let Some(status) = payload.status
        && payload.name.is_none()
    {
        db::update_account_status(&db, id, status).await?;
        return Ok(Json(json!({ "ok": true })));
    }

    db::update_account(&db, id, record_from_payload(payload)).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_accounts(
    State(state): State<SharedState>,
    Query(params): Query<public::AccountDeleteQuery>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();

    let ids: Vec<i64> = if let Some(ids) = &params.ids {
        ids.split(',').filter_map(|i| i.trim().parse().ok()).collect()
    } else {
        params.id.into_iter().collect()
    };

    if !ids.is_empty() {
        db::delete_accounts(&db, ids).await?;
    }
    Ok(Json(json!({ "ok": true })))
}

/// Create the accounts router
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/",
        get(list_accounts)
            .post(create_accounts)
            .put(update_account)
            .delete(delete_accounts),
    )
}
