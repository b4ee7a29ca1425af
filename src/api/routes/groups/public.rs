//! Public types for the filter groups API
use serde::{Deserialize, Serialize};

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    30
}

#[derive(Deserialize)]
pub struct GroupListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Deserialize)]
pub struct GroupPayload {
    pub id: Option<i64>,
    pub name: String,
    pub match_sender: Option<String>,
    pub match_receiver: Option<String>,
    pub match_body: Option<String>,
}

#[derive(Deserialize)]
pub struct GroupDeleteQuery {
    pub id: i64,
}

#[derive(Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub match_sender: Option<String>,
    pub match_receiver: Option<String>,
    pub match_body: Option<String>,
}
