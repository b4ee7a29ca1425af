//! Database queries for the access rules API
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, types::ToSql};
use tokio_rusqlite::Connection;

use super::public::Rule;

const RULE_COLUMNS: &str = "id, name, alias, query_code, fetch_limit, valid_until, \
                            match_sender, match_receiver, match_body, group_id";

/// Fields stored for a new or updated rule
#[derive(Debug, Clone)]
pub struct RuleRecord {
    pub name: String,
    pub alias: String,
    pub query_code: String,
    pub fetch_limit: Option<String>,
    pub valid_until: Option<i64>,
    pub match_sender: Option<String>,
    pub match_receiver: Option<String>,
    pub match_body: Option<String>,
    pub group_id: Option<i64>,
}

fn rule_from_row(row: &Row) -> rusqlite::Result<Rule> {
    Ok(Rule {
        id: row.get(0)?,
        name: row.get(1)?,
        alias: row.get(2)?,
        query_code: row.get(3)?,
        fetch_limit: row.get(4)?,
        valid_until: row.get(5)?,
        match_sender: row.get(6)?,
        match_receiver: row.get(7)?,
        match_body: row.get(8)?,
        group_id: row.get(9)?,
    })
}

pub async fn list_rules(
    db: &Connection,
    page: i64,
    limit: i64,
    q: Option<String>,
) -> Result<(Vec<Rule>, i64)> {
    let offset = (page - 1) * limit;
    db.call(move |conn| {
        let like = q.filter(|q| !q.is_empty()).map(|q| format!("%{}%", q));

        let mut where_clause = String::from("WHERE 1=1");
        let mut params: Vec<&dyn ToSql> = Vec::new();
        if let Some(like) = &like {
            where_clause.push_str(" AND (name LIKE ? OR query_code LIKE ?)");
            params.extend([like as &dyn ToSql, like]);
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM access_rules {}", where_clause),
            &params[..],
            |row| row.get(0),
        )?;

        params.push(&limit);
        params.push(&offset);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM access_rules {} ORDER BY id DESC LIMIT ? OFFSET ?",
            RULE_COLUMNS, where_clause
        ))?;
        let rows = stmt
            .query_map(&params[..], rule_from_row)?
            .filter_map(Result::ok)
            .collect::<Vec<Rule>>();

        Ok((rows, total))
    })
    .await
    .map_err(|e| e.into())
}

pub async fn get_rule_by_code(db: &Connection, code: String) -> Result<Option<Rule>> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM access_rules WHERE query_code = ?",
            RULE_COLUMNS
        ))?;
        Ok(stmt.query_row([&code], rule_from_row).optional()?)
    })
    .await
    .map_err(|e| e.into())
}

pub async fn code_exists(db: &Connection, code: String) -> Result<bool> {
    db.call(move |conn| {
        Ok(conn
            .prepare("SELECT 1 FROM access_rules WHERE query_code = ? COLLATE NOCASE")?
            .exists([&code])?)
    })
    .await
    .map_err(|e| e.into())
}

pub async fn name_alias_exists(db: &Connection, name: String, alias: String) -> Result<bool> {
    db.call(move |conn| {
        Ok(conn
            .prepare(
                "SELECT 1 FROM access_rules
                 WHERE name = ? COLLATE NOCASE AND alias = ? COLLATE NOCASE",
            )?
            .exists([&name, &alias])?)
    })
    .await
    .map_err(|e| e.into())
}

pub async fn insert_rule(db: &Connection, record: RuleRecord) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO access_rules
               (name, alias, query_code, fetch_limit, valid_until,
                match_sender, match_receiver, match_body, group_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            tokio_rusqlite::params![
                record.name,
                record.alias,
                record.query_code,
                record.fetch_limit,
                record.valid_until,
                record.match_sender,
                record.match_receiver,
                record.match_body,
                record.group_id,
            ],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

pub async fn update_rule(db: &Connection, id: i64, record: RuleRecord) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE access_rules
             SET name = ?, alias = ?, query_code = ?, fetch_limit = ?, valid_until = ?,
                 match_sender = ?, match_receiver = ?, match_body = ?, group_id = ?
             WHERE id = ?",
            tokio_rusqlite::params![
                record.name,
                record.alias,
                record.query_code,
                record.fetch_limit,
                record.valid_until,
                record.match_sender,
                record.match_receiver,
                record.match_body,
                record.group_id,
                id,
            ],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

/// Batch delete with a single `IN (...)` statement
pub async fn delete_rules(db: &Connection, ids: Vec<i64>) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    db.call(move |conn| {
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
        conn.execute(
            &format!("DELETE FROM access_rules WHERE id IN ({})", placeholders),
            &params[..],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}
