//! Executes send tasks whose scheduled time has arrived.
//!
//! The sweep picks up every task that is not yet marked `success` and is due,
//! sends it through the account's transport, then advances recurring tasks or
//! finalizes one-shot tasks. Failed sends keep their schedule so the next
//! sweep retries them.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio_rusqlite::Connection;

use super::PeriodicJob;
use crate::api::routes::accounts::db as accounts_db;
use crate::core::AppConfig;
use crate::google::gmail;
use crate::schedule::{next_run_from_config, now_ms};
use crate::transport::{self, TransportMode};

/// Tasks picked up per sweep. Keeps one slow batch from starving the next.
const SWEEP_LIMIT: i64 = 10;

#[derive(Debug, Default)]
pub struct SendDueTasks;

#[async_trait]
impl PeriodicJob for SendDueTasks {
    fn interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn run_job(&self, config: &AppConfig, db: &Connection) {
        if let Err(e) = run_due_tasks(config, db).await {
            tracing::error!("Send task sweep failed: {}", e);
        }
    }
}

#[derive(Debug, Clone)]
struct DueTask {
    id: i64,
    account_id: i64,
    to_email: String,
    subject: String,
    content: String,
    delay_config: Option<String>,
    is_loop: bool,
    execution_mode: Option<String>,
}

/// One sweep over the due tasks. Public so the CLI can trigger it manually.
pub async fn run_due_tasks(config: &AppConfig, db: &Connection) -> Result<()> {
    let now = now_ms();
    let due = find_due_tasks(db, now).await?;
    if due.is_empty() {
        return Ok(());
    }
    tracing::info!("Found {} due send task(s)", due.len());

    // Refreshing the same account's token once per sweep is enough
    let mut token_cache: HashMap<i64, String> = HashMap::new();

    for task in due {
        let result = execute_task(config, db, &task, &mut token_cache).await;
        match &result {
            Ok(()) => tracing::info!(
                "Task {} sent to {} via account {}",
                task.id,
                task.to_email,
                task.account_id
            ),
            Err(e) => tracing::warn!("Task {} failed: {}", task.id, e),
        }
        record_outcome(db, &task, result.err().map(|e| e.to_string())).await?;
    }
    Ok(())
}

async fn execute_task(
    config: &AppConfig,
    db: &Connection,
    task: &DueTask,
    token_cache: &mut HashMap<i64, String>,
) -> Result<()> {
    let account = accounts_db::get_account(db, task.account_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account {} no longer exists", task.account_id))?;

    match transport::resolve_send_mode(task.execution_mode.as_deref(), &account) {
        TransportMode::Api => {
            let token = match token_cache.get(&account.id) {
                Some(token) => token.clone(),
                None => {
                    let token = transport::access_token_for(config, &account).await?;
                    token_cache.insert(account.id, token.clone());
                    token
                }
            };
            gmail::send_message(
                &config.gmail_api_base_url,
                &token,
                &task.to_email,
                &task.subject,
                &task.content,
            )
            .await
        }
        TransportMode::Gas => {
            gas_send(config, &account, task).await
        }
    }
}

async fn gas_send(
    config: &AppConfig,
    account: &transport::Account,
    task: &DueTask,
) -> Result<()> {
    crate::gas::send_message(
        &account.script_url,
        &transport::gas_token(config, account),
        &task.to_email,
        &task.subject,
        &task.content,
    )
    .await
}

async fn find_due_tasks(db: &Connection, now: i64) -> Result<Vec<DueTask>> {
    let tasks = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                r"
          SELECT
            id,
            account_id,
            to_email,
            subject,
            content,
            delay_config,
            is_loop,
            execution_mode
          FROM send_tasks
          WHERE status != 'success' AND next_run_at <= ?
          ORDER BY next_run_at ASC
          LIMIT ?
        ",
            )?;
            let rows = stmt
                .query_map(tokio_rusqlite::params![now, SWEEP_LIMIT], |row| {
                    Ok(DueTask {
                        id: row.get(0)?,
                        account_id: row.get(1)?,
                        to_email: row.get(2)?,
                        subject: row.get(3)?,
                        content: row.get(4)?,
                        delay_config: row.get(5)?,
                        is_loop: row.get::<_, i64>(6)? != 0,
                        execution_mode: row.get(7)?,
                    })
                })?
                .filter_map(Result::ok)
                .collect::<Vec<DueTask>>();
            Ok(rows)
        })
        .await?;
    Ok(tasks)
}

/// Update counts, status, and schedule after an attempt. Recurring tasks
/// stay `pending` with a fresh `next_run_at`; one-shot tasks finalize.
async fn record_outcome(db: &Connection, task: &DueTask, error: Option<String>) -> Result<()> {
    let task = task.clone();
    let succeeded = error.is_none();
    db.call(move |conn| {
        if task.is_loop {
            let next_run = next_run_from_config(now_ms(), task.delay_config.as_deref());
            let count_col = if succeeded { "success_count" } else { "fail_count" };
            conn.execute(
                &format!(
                    "UPDATE send_tasks
                     SET next_run_at = ?, status = 'pending', {} = {} + 1,
                         last_error = ?, updated_at = datetime('now')
                     WHERE id = ?",
                    count_col, count_col
                ),
                tokio_rusqlite::params![next_run, error, task.id],
            )?;
        } else if succeeded {
            conn.execute(
                "UPDATE send_tasks
                 SET status = 'success', success_count = success_count + 1,
                     last_error = NULL, updated_at = datetime('now')
                 WHERE id = ?",
                tokio_rusqlite::params![task.id],
            )?;
        } else {
            conn.execute(
                "UPDATE send_tasks
                 SET status = 'error', fail_count = fail_count + 1,
                     last_error = ?, updated_at = datetime('now')
                 WHERE id = ?",
                tokio_rusqlite::params![error, task.id],
            )?;
        }
        Ok(())
    })
    .await?;
    Ok(())
}
