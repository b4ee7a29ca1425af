//! Google Apps Script web-app transport.
//!
//! Accounts without Gmail API credentials point at a deployed Apps Script
//! endpoint instead. The script speaks a small query-string protocol:
//! `action=send` delivers mail, `action=get&limit=N` returns recent inbox
//! items as JSON. Every call carries a `token` the script validates.

use anyhow::{Result, anyhow};
use chrono::DateTime;
use reqwest::Client;
use serde_json::Value;

use crate::schedule::now_ms;
use crate::transport::{FetchedEmail, MailFilter};

/// Over-fetch factor for `action=get`. Filtering happens on our side, so we
/// pull extra rows to have enough left after matching.
const FETCH_MULTIPLIER: usize = 3;

/// Append the auth token to a script URL, validating the URL first
fn script_endpoint(script_url: &str, token: &str) -> Result<String> {
    let script_url = script_url.trim();
    if !script_url.starts_with("http") {
        return Err(anyhow!("Apps Script URL is not valid: {:?}", script_url));
    }
    let join = if script_url.contains('?') { '&' } else { '?' };
    Ok(format!(
        "{}{}token={}",
        script_url,
        join,
        urlencoding::encode(token)
    ))
}

/// Send a message through the script's `action=send` endpoint
pub async fn send_message(
    script_url: &str,
    token: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<()> {
    let url = script_endpoint(script_url, token)?;
    let subject = if subject.is_empty() { "No Subject" } else { subject };
    let body = if body.is_empty() { " " } else { body };

    let client = Client::new();
    let res = client
        .post(&url)
        .form(&[
            ("action", "send"),
            ("to", to),
            ("subject", subject),
            ("body", body),
        ])
        .send()
        .await?;

    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!("Apps Script send failed: HTTP {}", status));
    }

    // The script reports success in prose rather than a status code
    if text.contains("OK") || text.contains("Sent") || text.contains("success") {
        return Ok(());
    }
    Err(anyhow!(
        "Apps Script send failed: {}",
        text.chars().take(100).collect::<String>()
    ))
}

/// Fetch recent messages through the script's `action=get` endpoint and
/// apply the rule filters locally
pub async fn fetch_messages(
    script_url: &str,
    token: &str,
    limit: usize,
    filter: Option<&MailFilter>,
) -> Result<Vec<FetchedEmail>> {
    let base = script_endpoint(script_url, token)?;
    let url = format!("{}&action=get&limit={}", base, limit * FETCH_MULTIPLIER);

    let client = Client::new();
    let res = client.get(&url).send().await?;
    let status = res.status();
    if !status.is_success() {
        return Err(anyhow!("Apps Script fetch failed: HTTP {}", status));
    }

    let text = res.text().await?;
    let items = parse_items(&text)?;

    let mut results = Vec::new();
    for item in items {
        let email = email_from_item(&item);
        if matches_filter(&email, filter) {
            results.push(email);
        }
        if results.len() >= limit {
            break;
        }
    }
    Ok(results)
}

/// Parse the script response. Scripts in the wild return either a bare JSON
/// array or `{"data": [...]}`; an HTML body means the deployment is broken.
fn parse_items(text: &str) -> Result<Vec<Value>> {
    if text.trim_start().starts_with('<') {
        return Err(anyhow!("Apps Script returned HTML instead of JSON"));
    }
    let parsed: Value =
        serde_json::from_str(text).map_err(|_| anyhow!("Apps Script returned invalid JSON"))?;

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };
    Ok(items)
}

fn email_from_item(item: &Value) -> FetchedEmail {
    let str_field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| item.get(*k).and_then(Value::as_str))
            .map(String::from)
    };

    let subject = str_field(&["subject"]).unwrap_or_else(|| "(No Subject)".to_string());
    let sender = str_field(&["from", "sender"]).unwrap_or_else(|| "Unknown".to_string());
    let body = str_field(&["snippet", "body"]).unwrap_or_default();
    let received_at = item
        .get("date")
        .and_then(parse_item_date)
        .unwrap_or_else(now_ms);

    FetchedEmail {
        id: str_field(&["id"]),
        sender,
        subject,
        body,
        received_at,
    }
}

/// Dates arrive as RFC 2822/3339 strings or epoch milliseconds depending on
/// how the script serializes them
fn parse_item_date(value: &Value) -> Option<i64> {
    if let Some(ms) = value.as_i64() {
        return Some(ms);
    }
    let text = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp_millis());
    }
    None
}

fn matches_filter(email: &FetchedEmail, filter: Option<&MailFilter>) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    if let Some(sender) = filter.sender.as_deref().filter(|s| !s.is_empty())
        && !email
            .sender
            .to_lowercase()
            .contains(&sender.to_lowercase())
    {
        return false;
    }

    let keywords = filter.body_keywords();
    if !keywords.is_empty() {
        let body = email.body.to_lowercase();
        if !keywords.iter().any(|k| body.contains(&k.to_lowercase())) {
            return false;
        }
    }

    true
}
