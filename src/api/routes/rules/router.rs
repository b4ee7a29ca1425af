//! Router for the access rules API

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{Json, Router, extract::State, routing::get};
use axum_extra::extract::Query;
use rand::Rng;
use serde_json::{Value, json};

use super::db::{self, RuleRecord};
use super::public;
use crate::api::public::{OneOrMany, Page};
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Random code for a new rule's public link
fn generate_query_code() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn record_from_payload(item: public::RulePayload, query_code: String) -> RuleRecord {
    RuleRecord {
        name: item.name,
        alias: item.alias.unwrap_or_default(),
        query_code,
        fetch_limit: item.fetch_limit,
        valid_until: item.valid_until,
        match_sender: item.match_sender,
        match_receiver: item.match_receiver,
        match_body: item.match_body,
        group_id: item.group_id,
    }
}

async fn list_rules(
    State(state): State<SharedState>,
    Query(params): Query<public::RuleListQuery>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    let (data, total) = db::list_rules(&db, params.page, params.limit, params.q).await?;
    let page = Page::new(data, total, params.page, params.limit);
    Ok(Json(serde_json::to_value(page)?))
}

// Create one rule or import a batch, skipping duplicates
async fn create_rules(
    State(state): State<SharedState>,
    Json(payload): Json<OneOrMany<public::RulePayload>>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();

    let mut imported = 0;
    let mut skipped: Vec<String> = Vec::new();

    for item in payload.into_vec() {
        let explicit_code = item.query_code.clone().filter(|c| !c.is_empty());
        let code = explicit_code
            .clone()
            .unwrap_or_else(generate_query_code);

        // A rule imported with its code is a duplicate when the code is
        // taken; one without is a duplicate when name + alias already exist
        let exists = if explicit_code.is_some() {
            db::code_exists(&db, code.clone()).await?
        } else {
            db::name_alias_exists(
                &db,
                item.name.clone(),
                item.alias.clone().unwrap_or_default(),
            )
            .await?
        };

        if exists {
            skipped.push(format!("{} ({})", item.name, code));
            continue;
        }

        db::insert_rule(&db, record_from_payload(item, code)).await?;
        imported += 1;
    }

    Ok(Json(
        json!({ "success": true, "imported": imported, "skipped": skipped }),
    ))
}

async fn update_rule(
    State(state): State<SharedState>,
    Json(payload): Json<public::RulePayload>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    let id = payload.id.ok_or_else(|| anyhow!("Missing rule id"))?;
    let code = payload
        .query_code
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(generate_query_code);
    db::update_rule(&db, id, record_from_payload(payload, code)).await?;
    Ok(Json(json!({ "success": true })))
}

// Batch delete takes the ids in the request body
async fn delete_rules(
    State(state): State<SharedState>,
    Json(ids): Json<Vec<i64>>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    db::delete_rules(&db, ids).await?;
    Ok(Json(json!({ "success": true })))
}

/// Create the access rules router
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/",
        get(list_rules)
            .post(create_rules)
            .put(update_rule)
            .delete(delete_rules),
    )
}
