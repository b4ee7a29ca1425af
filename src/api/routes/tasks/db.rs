//! Database queries for the send tasks API
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, types::ToSql};
use tokio_rusqlite::Connection;

use super::public::TaskRow;

const TASK_COLUMNS: &str = "t.id, t.account_id, a.name, t.to_email, t.subject, t.content, \
                            t.base_date, t.delay_config, t.next_run_at, t.is_loop, t.status, \
                            t.success_count, t.fail_count, t.execution_mode, t.last_error, \
                            t.created_at, t.updated_at";

/// Fields stored for a new or updated task
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub account_id: i64,
    pub to_email: String,
    pub subject: String,
    pub content: String,
    pub base_date: Option<String>,
    pub delay_config: Option<String>,
    pub next_run_at: i64,
    pub is_loop: bool,
    pub execution_mode: String,
}

fn task_from_row(row: &Row) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        account_name: row.get(2)?,
        to_email: row.get(3)?,
        subject: row.get(4)?,
        content: row.get(5)?,
        base_date: row.get(6)?,
        delay_config: row.get(7)?,
        next_run_at: row.get(8)?,
        is_loop: row.get(9)?,
        status: row.get(10)?,
        success_count: row.get(11)?,
        fail_count: row.get(12)?,
        execution_mode: row.get(13)?,
        last_error: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

/// Paginated listing ordered by due time, joined to the account for its name
pub async fn list_tasks(
    db: &Connection,
    page: i64,
    limit: i64,
    q: Option<String>,
) -> Result<(Vec<TaskRow>, i64)> {
    let offset = (page - 1) * limit;
    db.call(move |conn| {
        let like = q.filter(|q| !q.is_empty()).map(|q| format!("%{}%", q));

        let mut where_clause = String::from("WHERE 1=1");
        let mut params: Vec<&dyn ToSql> = Vec::new();
        if let Some(like) = &like {
            where_clause.push_str(" AND (t.subject LIKE ? OR t.to_email LIKE ?)");
            params.extend([like as &dyn ToSql, like]);
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM send_tasks t {}", where_clause),
            &params[..],
            |row| row.get(0),
        )?;

        params.push(&limit);
        params.push(&offset);
        let mut stmt = conn.prepare(&format!(
            "SELECT {}
             FROM send_tasks t
             LEFT JOIN accounts a ON t.account_id = a.id
             {}
             ORDER BY t.next_run_at ASC
             LIMIT ? OFFSET ?",
            TASK_COLUMNS, where_clause
        ))?;
        let rows = stmt
            .query_map(&params[..], task_from_row)?
            .filter_map(Result::ok)
            .collect::<Vec<TaskRow>>();

        Ok((rows, total))
    })
    .await
    .map_err(|e| e.into())
}

pub async fn get_task(db: &Connection, id: i64) -> Result<Option<TaskRow>> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {}
             FROM send_tasks t
             LEFT JOIN accounts a ON t.account_id = a.id
             WHERE t.id = ?",
            TASK_COLUMNS
        ))?;
        Ok(stmt.query_row([id], task_from_row).optional()?)
    })
    .await
    .map_err(|e| e.into())
}

/// An identical pending/sent/failed task already queued for the same
/// account counts as a duplicate no matter its status
pub async fn task_exists(
    db: &Connection,
    account_id: i64,
    to_email: String,
    subject: String,
    content: String,
) -> Result<bool> {
    db.call(move |conn| {
        Ok(conn
            .prepare(
                "SELECT 1 FROM send_tasks
                 WHERE account_id = ? AND to_email = ? AND subject = ? AND content = ?",
            )?
            .exists(tokio_rusqlite::params![
                account_id, to_email, subject, content
            ])?)
    })
    .await
    .map_err(|e| e.into())
}

pub async fn insert_task(db: &Connection, record: TaskRecord) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO send_tasks
               (account_id, to_email, subject, content, base_date, delay_config,
                next_run_at, is_loop, status, execution_mode)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
            tokio_rusqlite::params![
                record.account_id,
                record.to_email,
                record.subject,
                record.content,
                record.base_date,
                record.delay_config,
                record.next_run_at,
                record.is_loop as i64,
                record.execution_mode,
            ],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

/// Rewrite a task and put it back on the pending schedule
pub async fn update_task(db: &Connection, id: i64, record: TaskRecord) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE send_tasks
             SET account_id = ?, to_email = ?, subject = ?, content = ?, base_date = ?,
                 delay_config = ?, next_run_at = ?, is_loop = ?, execution_mode = ?,
                 status = 'pending', updated_at = datetime('now')
             WHERE id = ?",
            tokio_rusqlite::params![
                record.account_id,
                record.to_email,
                record.subject,
                record.content,
                record.base_date,
                record.delay_config,
                record.next_run_at,
                record.is_loop as i64,
                record.execution_mode,
                id,
            ],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

/// Bookkeeping after a manual execute. Unlike the periodic sweep this never
/// touches `next_run_at`; a looping task keeps its schedule.
pub async fn record_manual_outcome(
    db: &Connection,
    id: i64,
    is_loop: bool,
    error: Option<String>,
) -> Result<()> {
    db.call(move |conn| {
        match (&error, is_loop) {
            (None, true) => {
                conn.execute(
                    "UPDATE send_tasks
                     SET success_count = success_count + 1, updated_at = datetime('now')
                     WHERE id = ?",
                    [id],
                )?;
            }
            (None, false) => {
                conn.execute(
                    "UPDATE send_tasks
                     SET status = 'success', success_count = success_count + 1,
                         updated_at = datetime('now')
                     WHERE id = ?",
                    [id],
                )?;
            }
            (Some(_), _) => {
                conn.execute(
                    "UPDATE send_tasks
                     SET status = 'error', fail_count = fail_count + 1, last_error = ?,
                         updated_at = datetime('now')
                     WHERE id = ?",
                    tokio_rusqlite::params![error, id],
                )?;
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

pub async fn delete_tasks(db: &Connection, ids: Vec<i64>) -> Result<()> {
    db.call(move |conn| {
        for id in ids {
            conn.execute("DELETE FROM send_tasks WHERE id = ?", [id])?;
        }
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}
