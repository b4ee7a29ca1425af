//! Public types for the send tasks API
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    50
}

#[derive(Deserialize)]
pub struct TaskListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub q: Option<String>,
}

/// Create/update payload. `immediate` bypasses scheduling entirely and
/// `action: "execute"` runs a stored task right now.
#[derive(Deserialize)]
pub struct TaskPayload {
    pub id: Option<i64>,
    pub immediate: Option<bool>,
    pub action: Option<String>,
    pub account_id: Option<i64>,
    pub to_email: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub base_date: Option<String>,
    pub delay_config: Option<String>,
    /// Arrives as a bool or a 0/1 integer depending on the client
    #[serde(default)]
    pub is_loop: Value,
    pub execution_mode: Option<String>,
}

impl TaskPayload {
    pub fn is_loop(&self) -> bool {
        self.is_loop.as_bool().unwrap_or(false) || self.is_loop.as_i64().is_some_and(|n| n != 0)
    }
}

#[derive(Deserialize)]
pub struct TaskDeleteQuery {
    pub id: Option<i64>,
    pub ids: Option<String>,
}

#[derive(Serialize)]
pub struct TaskRow {
    pub id: i64,
    pub account_id: i64,
    /// Joined from the accounts table for display
    pub account_name: Option<String>,
    pub to_email: String,
    pub subject: String,
    pub content: String,
    pub base_date: Option<String>,
    pub delay_config: Option<String>,
    pub next_run_at: i64,
    pub is_loop: i64,
    pub status: String,
    pub success_count: i64,
    pub fail_count: i64,
    pub execution_mode: String,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
