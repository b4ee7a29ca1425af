//! Public types for the accounts API
use serde::{Deserialize, Serialize};

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    50
}

#[derive(Deserialize)]
pub struct AccountListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub q: Option<String>,
    /// `simple` returns id/name/alias only, `export` returns every column
    #[serde(rename = "type")]
    pub view: Option<String>,
}

/// Create/update payload. Batch imports send an array of these.
#[derive(Deserialize)]
pub struct AccountPayload {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub script_url: Option<String>,
    /// Alternate spelling used by import files
    pub gas_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// `client_id,client_secret,refresh_token` in one field
    pub api_config: Option<String>,
    pub status: Option<i64>,
}

#[derive(Deserialize)]
pub struct AccountDeleteQuery {
    pub id: Option<i64>,
    pub ids: Option<String>,
}

#[derive(Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub name: String,
    pub alias: String,
}
