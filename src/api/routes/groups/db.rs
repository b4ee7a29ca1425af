//! Database queries for the filter groups API
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::public::Group;

fn group_from_row(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        match_sender: row.get(2)?,
        match_receiver: row.get(3)?,
        match_body: row.get(4)?,
    })
}

pub async fn list_groups(db: &Connection, page: i64, limit: i64) -> Result<(Vec<Group>, i64)> {
    let offset = (page - 1) * limit;
    db.call(move |conn| {
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM filter_groups", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT id, name, match_sender, match_receiver, match_body
             FROM filter_groups ORDER BY id DESC LIMIT ? OFFSET ?",
        )?;
        let rows = stmt
            .query_map([limit, offset], group_from_row)?
            .filter_map(Result::ok)
            .collect::<Vec<Group>>();

        Ok((rows, total))
    })
    .await
    .map_err(|e| e.into())
}

pub async fn get_group(db: &Connection, id: i64) -> Result<Option<Group>> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, name, match_sender, match_receiver, match_body
             FROM filter_groups WHERE id = ?",
        )?;
        Ok(stmt.query_row([id], group_from_row).optional()?)
    })
    .await
    .map_err(|e| e.into())
}

pub async fn insert_group(
    db: &Connection,
    name: String,
    match_sender: Option<String>,
    match_receiver: Option<String>,
    match_body: Option<String>,
) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO filter_groups (name, match_sender, match_receiver, match_body)
             VALUES (?, ?, ?, ?)",
            tokio_rusqlite::params![name, match_sender, match_receiver, match_body],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

pub async fn update_group(
    db: &Connection,
    id: i64,
    name: String,
    match_sender: Option<String>,
    match_receiver: Option<String>,
    match_body: Option<String>,
) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE filter_groups
             SET name = ?, match_sender = ?, match_receiver = ?, match_body = ?
             WHERE id = ?",
            tokio_rusqlite::params![name, match_sender, match_receiver, match_body, id],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

/// Delete a group after detaching any rules that reference it, so those
/// rules fall back to their own filters
pub async fn delete_group(db: &Connection, id: i64) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE access_rules SET group_id = NULL WHERE group_id = ?",
            [id],
        )?;
        conn.execute("DELETE FROM filter_groups WHERE id = ?", [id])?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}
