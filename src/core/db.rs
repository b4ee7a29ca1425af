//! SQLite storage for accounts, access rules, filter groups, and send tasks
use anyhow::Result;
use rusqlite::Connection;
use tokio_rusqlite::Connection as AsyncConnection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  email TEXT NOT NULL DEFAULT '',
  alias TEXT NOT NULL DEFAULT '',
  kind TEXT NOT NULL DEFAULT 'API',
  script_url TEXT NOT NULL DEFAULT '',
  client_id TEXT,
  client_secret TEXT,
  refresh_token TEXT,
  status INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS filter_groups (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  match_sender TEXT,
  match_receiver TEXT,
  match_body TEXT
);

CREATE TABLE IF NOT EXISTS access_rules (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  alias TEXT NOT NULL DEFAULT '',
  query_code TEXT NOT NULL,
  fetch_limit TEXT,
  valid_until INTEGER,
  match_sender TEXT,
  match_receiver TEXT,
  match_body TEXT,
  group_id INTEGER
);

CREATE TABLE IF NOT EXISTS send_tasks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  account_id INTEGER NOT NULL,
  to_email TEXT NOT NULL,
  subject TEXT NOT NULL DEFAULT '',
  content TEXT NOT NULL DEFAULT '',
  base_date TEXT,
  delay_config TEXT,
  next_run_at INTEGER NOT NULL,
  is_loop INTEGER NOT NULL DEFAULT 0,
  status TEXT NOT NULL DEFAULT 'pending',
  success_count INTEGER NOT NULL DEFAULT 0,
  fail_count INTEGER NOT NULL DEFAULT 0,
  execution_mode TEXT NOT NULL DEFAULT 'AUTO',
  last_error TEXT,
  created_at TEXT NOT NULL DEFAULT (datetime('now')),
  updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_access_rules_query_code ON access_rules (query_code);
CREATE INDEX IF NOT EXISTS idx_send_tasks_next_run_at ON send_tasks (next_run_at);
"#;

/// Open the SQLite database stored under `db_path`
pub async fn async_db(db_path: &str) -> Result<AsyncConnection> {
    let conn = AsyncConnection::open(format!("{}/mailbridge.sqlite3", db_path)).await?;
    Ok(conn)
}

/// Create all tables and indices
pub fn initialize_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Bring an existing database up to the current schema. Statements are
/// additive (`IF NOT EXISTS`) so re-running is safe.
pub fn migrate_db(conn: &Connection) -> Result<()> {
    initialize_db(conn)
}
