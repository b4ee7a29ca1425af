//! Router for the filter groups API

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{Json, Router, extract::State, routing::get};
use axum_extra::extract::Query;
use serde_json::{Value, json};

use super::db;
use super::public;
use crate::api::public::Page;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

async fn list_groups(
    State(state): State<SharedState>,
    Query(params): Query<public::GroupListQuery>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    let (data, total) = db::list_groups(&db, params.page, params.limit).await?;
    let page = Page::new(data, total, params.page, params.limit);
    Ok(Json(serde_json::to_value(page)?))
}

async fn create_group(
    State(state): State<SharedState>,
    Json(payload): Json<public::GroupPayload>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    db::insert_group(
        &db,
        payload.name,
        payload.match_sender,
        payload.match_receiver,
        payload.match_body,
    )
    .await?;
    Ok(Json(json!({ "ok": true })))
}

async fn update_group(
    State(state): State<SharedState>,
    Json(payload): Json<public::GroupPayload>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    let id = payload.id.ok_or_else(|| anyhow!("Missing group id"))?;
    db::update_group(
        &db,
        id,
        payload.name,
        payload.match_sender,
        payload.match_receiver,
        payload.match_body,
    )
    .await?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_group(
    State(state): State<SharedState>,
    Query(params): Query<public::GroupDeleteQuery>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    db::delete_group(&db, params.id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Create the filter groups router
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/",
        get(list_groups)
            .post(create_group)
            .put(update_group)
            .delete(delete_group),
    )
}
