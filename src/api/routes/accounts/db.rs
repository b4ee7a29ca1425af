//! Database queries for the accounts API
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, types::ToSql};
use tokio_rusqlite::Connection;

use super::public::AccountSummary;
use crate::transport::Account;

const ACCOUNT_COLUMNS: &str = "id, name, email, alias, kind, script_url, client_id, \
                               client_secret, refresh_token, status, created_at";

/// Fields stored for a new or updated account
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub name: String,
    pub email: String,
    pub alias: String,
    pub kind: String,
    pub script_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        alias: row.get(3)?,
        kind: row.get(4)?,
        script_url: row.get(5)?,
        client_id: row.get(6)?,
        client_secret: row.get(7)?,
        refresh_token: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Paginated account listing. Hidden rows (`status < 0`) are excluded and
/// `q` fuzzy-matches name, alias, or email.
pub async fn list_accounts(
    db: &Connection,
    page: i64,
    limit: i64,
    q: Option<String>,
) -> Result<(Vec<Account>, i64)> {
    let offset = (page - 1) * limit;
    db.call(move |conn| {
        let like = q.filter(|q| !q.is_empty()).map(|q| format!("%{}%", q));

        let mut where_clause = String::from("WHERE status >= 0");
        let mut params: Vec<&dyn ToSql> = Vec::new();
        if let Some(like) = &like {
            where_clause.push_str(" AND (name LIKE ? OR alias LIKE ? OR email LIKE ?)");
            params.extend([like as &dyn ToSql, like, like]);
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM accounts {}", where_clause),
            &params[..],
            |row| row.get(0),
        )?;

        params.push(&limit);
        params.push(&offset);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts {} ORDER BY id DESC LIMIT ? OFFSET ?",
            ACCOUNT_COLUMNS, where_clause
        ))?;
        let rows = stmt
            .query_map(&params[..], account_from_row)?
            .filter_map(Result::ok)
            .collect::<Vec<Account>>();

        Ok((rows, total))
    })
    .await
    .map_err(|e| e.into())
}

/// Trimmed listing for dropdowns
pub async fn list_accounts_simple(db: &Connection) -> Result<Vec<AccountSummary>> {
    db.call(|conn| {
        let mut stmt = conn.prepare("SELECT id, name, alias FROM accounts ORDER BY id DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AccountSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    alias: row.get(2)?,
                })
            })?
            .filter_map(Result::ok)
            .collect::<Vec<AccountSummary>>();
        Ok(rows)
    })
    .await
    .map_err(|e| e.into())
}

/// Every column of every account, for backup exports
pub async fn export_accounts(db: &Connection) -> Result<Vec<Account>> {
    db.call(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts ORDER BY id DESC",
            ACCOUNT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], account_from_row)?
            .filter_map(Result::ok)
            .collect::<Vec<Account>>();
        Ok(rows)
    })
    .await
    .map_err(|e| e.into())
}

pub async fn get_account(db: &Connection, id: i64) -> Result<Option<Account>> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))?;
        Ok(stmt.query_row([id], account_from_row).optional()?)
    })
    .await
    .map_err(|e| e.into())
}

/// Resolve the account an access rule points at: exact name match first,
/// then a fuzzy email match, active accounts only
pub async fn find_account_for_rule(db: &Connection, name: String) -> Result<Option<Account>> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE name = ? AND status = 1",
            ACCOUNT_COLUMNS
        ))?;
        if let Some(account) = stmt.query_row([&name], account_from_row).optional()? {
            return Ok(Some(account));
        }

        let like = format!("%{}%", name);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE email LIKE ? AND status = 1",
            ACCOUNT_COLUMNS
        ))?;
        Ok(stmt.query_row([&like], account_from_row).optional()?)
    })
    .await
    .map_err(|e| e.into())
}

/// Import de-duplication, ignoring case. With an email both the address and
/// the name are checked; without one the name alone decides.
pub async fn duplicate_exists(db: &Connection, name: String, email: String) -> Result<bool> {
    db.call(move |conn| {
        let exists = if email.trim().is_empty() {
            conn.prepare("SELECT 1 FROM accounts WHERE name = ? COLLATE NOCASE")?
                .exists([&name])?
        } else {
            conn.prepare(
                "SELECT 1 FROM accounts WHERE email = ? COLLATE NOCASE OR name = ? COLLATE NOCASE",
            )?
            .exists([&email, &name])?
        };
        Ok(exists)
    })
    .await
    .map_err(|e| e.into())
}

pub async fn insert_account(db: &Connection, record: AccountRecord) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO accounts
               (name, email, alias, kind, script_url, client_id, client_secret, refresh_token, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)",
            tokio_rusqlite::params![
                record.name,
                record.email,
                record.alias,
                record.kind,
                record.script_url,
                record.client_id,
                record.client_secret,
                record.refresh_token,
            ],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

pub async fn update_account(db: &Connection, id: i64, record: AccountRecord) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE accounts
             SET name = ?, email = ?, alias = ?, kind = ?, script_url = ?,
                 client_id = ?, client_secret = ?, refresh_token = ?
             WHERE id = ?",
            tokio_rusqlite::params![
                record.name,
                record.email,
                record.alias,
                record.kind,
                record.script_url,
                record.client_id,
                record.client_secret,
                record.refresh_token,
                id,
            ],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

pub async fn update_account_status(db: &Connection, id: i64, status: i64) -> Result<()> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE accounts SET status = ? WHERE id = ?",
            tokio_rusqlite::params![status, id],
        )?;
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}

pub async fn delete_accounts(db: &Connection, ids: Vec<i64>) -> Result<()> {
    db.call(move |conn| {
        for id in ids {
            conn.execute("DELETE FROM accounts WHERE id = ?", [id])?;
        }
        Ok(())
    })
    .await
    .map_err(|e| e.into())
}
