//! Router for the send tasks API

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{Json, Router, extract::State, routing::get};
use axum_extra::extract::Query;
use serde_json::{Value, json};
use tokio_rusqlite::Connection;

use super::db::{self, TaskRecord};
use super::public;
use crate::api::public::{OneOrMany, Page};
use crate::api::routes::accounts::db as accounts_db;
use crate::api::state::AppState;
use crate::core::AppConfig;
use crate::schedule::{next_run_from_config, now_ms, parse_base_date};
use crate::transport;

type SharedState = Arc<RwLock<AppState>>;

fn state_parts(state: &SharedState) -> (Connection, AppConfig) {
    let shared_state = state.read().unwrap();
    (shared_state.db.clone(), shared_state.config.clone())
}

/// The next run is the task's base date when one is given, otherwise the
/// delay config counted from now
fn initial_next_run(base_date: Option<&str>, delay_config: Option<&str>) -> i64 {
    base_date
        .and_then(parse_base_date)
        .unwrap_or_else(|| next_run_from_config(now_ms(), delay_config))
}

fn record_from_payload(item: &public::TaskPayload) -> Result<TaskRecord, anyhow::Error> {
    let account_id = item.account_id.ok_or_else(|| anyhow!("Missing account_id"))?;
    let to_email = item
        .to_email
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("Missing to_email"))?;

    Ok(TaskRecord {
        account_id,
        to_email,
        subject: item.subject.clone().unwrap_or_default(),
        content: item.content.clone().unwrap_or_default(),
        base_date: item.base_date.clone(),
        delay_config: item.delay_config.clone(),
        next_run_at: initial_next_run(item.base_date.as_deref(), item.delay_config.as_deref()),
        is_loop: item.is_loop(),
        execution_mode: item
            .execution_mode
            .clone()
            .unwrap_or_else(|| "AUTO".to_string()),
    })
}

async fn list_tasks(
    State(state): State<SharedState>,
    Query(params): Query<public::TaskListQuery>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();
    let (data, total) = db::list_tasks(&db, params.page, params.limit, params.q).await?;
    let page = Page::new(data, total, params.page, params.limit);
    Ok(Json(serde_json::to_value(page)?))
}

// Queue one task or a batch, or send immediately without queueing
async fn create_tasks(
    State(state): State<SharedState>,
    Json(payload): Json<OneOrMany<public::TaskPayload>>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let (db, config) = state_parts(&state);

    let items = payload.into_vec();

    // An immediate request sends right now and stores nothing
    if let [item] = items.as_slice()
        && item.immediate == Some(true)
    {
        let account_id = item.account_id.ok_or_else(|| anyhow!("Missing account_id"))?;
        let Some(account) = accounts_db::get_account(&db, account_id).await? else {
            return Ok(Json(json!({ "ok": false, "error": "Account not found" })));
        };
        let result = transport::send_email(
            &config,
            &account,
            item.to_email.as_deref().unwrap_or_default(),
            item.subject.as_deref().unwrap_or_default(),
            item.content.as_deref().unwrap_or_default(),
            item.execution_mode.as_deref(),
        )
        .await;
        return Ok(Json(match result {
            Ok(()) => json!({ "ok": true }),
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        }));
    }

    let mut imported = 0;
    let mut skipped: Vec<String> = Vec::new();

    for item in &items {
        let record = record_from_payload(item)?;

        if db::task_exists(
            &db,
            record.account_id,
            record.to_email.clone(),
            record.subject.clone(),
            record.content.clone(),
        )
        .await?
        {
            skipped.push(format!("{} ({})", record.to_email, record.subject));
            continue;
        }

        db::insert_task(&db, record).await?;
        imported += 1;
    }

    Ok(Json(
        json!({ "ok": true, "imported": imported, "skipped": skipped }),
    ))
}

// Update a task, or execute it right now with `action: "execute"`
async fn update_task(
    State(state): State<SharedState>,
    Json(payload): Json<public::TaskPayload>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let (db, config) = state_parts(&state);

    if payload.action.as_deref() == Some("execute") {
        let id = payload.id.ok_or_else(|| anyhow!("Missing task id"))?;
        let Some(task) = db::get_task(&db, id).await? else {
            return Ok(Json(json!({ "error": "Task not found" })));
        };

        let result = match accounts_db::get_account(&db, task.account_id).await? {
            Some(account) => {
                transport::send_email(
                    &config,
                    &account,
                    &task.to_email,
                    &task.subject,
                    &task.content,
                    Some(task.execution_mode.as_str()),
                )
                .await
            }
            None => Err(anyhow!("Account {} no longer exists", task.account_id)),
        };

        let error = result.err().map(|e| e.to_string());
        db::record_manual_outcome(&db, id, task.is_loop != 0, error.clone()).await?;
        return Ok(Json(match error {
            None => json!({ "ok": true }),
            Some(error) => json!({ "ok": false, "error": error }),
        }));
    }

    let id = payload.id.ok_or_else(|| anyhow!("Missing task id"))?;
    let record = record_from_payload(&payload)?;
    db::update_task(&db, id, record).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_tasks(
    State(state): State<SharedState>,
    Query(params): Query<public::TaskDeleteQuery>,
) -> Result<Json<Value>, crate::api::public::ApiError> {
    let db = state.read().unwrap().db.clone();

    let ids: Vec<i64> = if let Some(ids) = &params.ids {
        ids.split(',').filter_map(|i| i.trim().parse().ok()).collect()
    } else {
        params.id.into_iter().collect()
    };

    if !ids.is_empty() {
        db::delete_tasks(&db, ids).await?;
    }
    Ok(Json(json!({ "ok": true })))
}

/// Create the send tasks router
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/",
        get(list_tasks)
            .post(create_tasks)
            .put(update_task)
            .delete(delete_tasks),
    )
}
