//! Public short-link query pages.
//!
//! `GET /{code}` is the only surface anonymous visitors ever see: it resolves
//! an access rule, pulls a filtered slice of the linked mailbox, and renders
//! it as a bare HTML page a phone browser can show instantly.

use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
};
use chrono::{FixedOffset, TimeZone, Utc};
use http::StatusCode;
use tokio_rusqlite::Connection;

use crate::api::routes::accounts::db as accounts_db;
use crate::api::routes::groups::db as groups_db;
use crate::api::routes::rules::db as rules_db;
use crate::api::state::AppState;
use crate::core::AppConfig;
use crate::schedule::now_ms;
use crate::transport::{self, MailFilter, display_text};

type SharedState = Arc<RwLock<AppState>>;

const PAGE_CSS: &str = "body { font-size: 16px; font-family: sans-serif; line-height: 1.3; \
                        color: #333; background: #fff; } .item, .msg { margin-bottom: 12px; }";

fn render_page(content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>Mail Query</title><style>{}</style></head><body>{}</body></html>",
        PAGE_CSS, content
    )
}

fn message_page(status: StatusCode, message: &str) -> Response {
    (
        status,
        Html(render_page(&format!("<div class=\"msg\">{}</div>", message))),
    )
        .into_response()
}

fn error_page(error: anyhow::Error) -> Response {
    tracing::error!("Public query failed: {}", error);
    message_page(
        StatusCode::INTERNAL_SERVER_ERROR,
        &format!("Query failed: {}", error),
    )
}

/// `"F-S"` means fetch F messages and show S of them; a bare `"F"` shows
/// everything fetched. Absent limits fetch 20 and show 5.
fn parse_fetch_limit(spec: Option<&str>) -> (usize, usize) {
    let Some(spec) = spec.map(str::trim).filter(|s| !s.is_empty()) else {
        return (20, 5);
    };
    let mut parts = spec.split('-');
    let fetch = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(20);
    let show = parts
        .next()
        .map(|p| p.trim().parse().unwrap_or(fetch))
        .unwrap_or(fetch);
    (fetch, show)
}

fn format_received(received_at: i64, utc_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    Utc.timestamp_millis_opt(received_at)
        .single()
        .map(|dt| {
            dt.with_timezone(&offset)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}

// The bare domain carries no code and never resolves
pub async fn root_handler(State(_state): State<SharedState>) -> Response {
    message_page(StatusCode::NOT_FOUND, "Link invalid")
}

pub async fn query_handler(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Response {
    let (db, config) = {
        let shared_state = state.read().unwrap();
        (shared_state.db.clone(), shared_state.config.clone())
    };
    render_query(&db, &config, &code).await
}

async fn render_query(db: &Connection, config: &AppConfig, code: &str) -> Response {
    let rule = match rules_db::get_rule_by_code(db, code.to_string()).await {
        Ok(Some(rule)) => rule,
        Ok(None) => return message_page(StatusCode::NOT_FOUND, "Link invalid"),
        Err(e) => return error_page(e),
    };

    // A zero expiry means the link never expires
    if let Some(valid_until) = rule.valid_until
        && valid_until > 0
        && now_ms() > valid_until
    {
        return message_page(StatusCode::FORBIDDEN, "Link expired");
    }

    // A linked filter group overrides the rule's own filters
    let mut filter = MailFilter {
        sender: rule.match_sender.clone(),
        receiver: rule.match_receiver.clone(),
        body: rule.match_body.clone(),
    };
    if let Some(group_id) = rule.group_id {
        match groups_db::get_group(db, group_id).await {
            Ok(Some(group)) => {
                filter = MailFilter {
                    sender: group.match_sender,
                    receiver: group.match_receiver,
                    body: group.match_body,
                };
            }
            Ok(None) => {}
            Err(e) => return error_page(e),
        }
    }

    let account = match accounts_db::find_account_for_rule(db, rule.name.clone()).await {
        Ok(Some(account)) => account,
        Ok(None) => return message_page(StatusCode::NOT_FOUND, "Account not found"),
        Err(e) => return error_page(e),
    };

    let (fetch_count, show_count) = parse_fetch_limit(rule.fetch_limit.as_deref());

    let emails =
        match transport::fetch_emails(config, &account, fetch_count, Some(&filter), None).await {
            Ok(emails) => emails,
            Err(e) => return error_page(e),
        };

    if emails.is_empty() {
        return message_page(StatusCode::OK, "No matching messages");
    }

    let items = emails
        .iter()
        .take(show_count)
        .map(|email| {
            format!(
                "<div class=\"item\">{} | {}</div>",
                format_received(email.received_at, config.display_utc_offset_hours),
                display_text(&email.body)
            )
        })
        .collect::<String>();

    (StatusCode::OK, Html(render_page(&items))).into_response()
}
