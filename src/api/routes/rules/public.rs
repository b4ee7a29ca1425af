//! Public types for the access rules API
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    30
}

/// Import files sometimes carry `fetch_limit` as a bare number instead of
/// the `"fetch-show"` string form
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

#[derive(Deserialize)]
pub struct RuleListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct RulePayload {
    pub id: Option<i64>,
    pub name: String,
    pub alias: Option<String>,
    pub query_code: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fetch_limit: Option<String>,
    /// Epoch milliseconds
    pub valid_until: Option<i64>,
    pub match_sender: Option<String>,
    pub match_receiver: Option<String>,
    pub match_body: Option<String>,
    pub group_id: Option<i64>,
}

#[derive(Serialize)]
pub struct Rule {
    pub id: i64,
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
