//! Public types for the live mailbox read API
use serde::Deserialize;

fn default_limit() -> usize {
    20
}

#[derive(Deserialize)]
pub struct EmailListQuery {
    pub account_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Force `API` or `GAS` instead of auto-detecting from the account
    pub mode: Option<String>,
}
