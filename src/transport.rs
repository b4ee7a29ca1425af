//! Dispatch between the two outbound mail transports.
//!
//! Every stored account can carry Gmail API credentials (client id/secret +
//! refresh token), an Apps Script URL, or both. Sends and mailbox reads go
//! through here so callers never care which transport ends up on the wire.

use anyhow::{Result, anyhow};
use regex::Regex;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::core::AppConfig;
use crate::gas;
use crate::google::gmail;
use crate::google::oauth::refresh_access_token;
use crate::schedule::now_ms;

/// A stored mail account row
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub alias: String,
    pub kind: String,
    pub script_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub status: i64,
    pub created_at: String,
}

impl Account {
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_script_url(&self) -> bool {
        !self.script_url.trim().is_empty()
    }
}

/// Sender/receiver/body filters from an access rule. `body` is a
/// `|`-separated keyword list where any keyword may match.
#[derive(Debug, Clone, Default)]
pub struct MailFilter {
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub body: Option<String>,
}

impl MailFilter {
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.sender) && blank(&self.receiver) && blank(&self.body)
    }

    pub fn body_keywords(&self) -> Vec<String> {
        self.body
            .as_deref()
            .map(|b| {
                b.split('|')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A mailbox message normalized across transports
#[derive(Debug, Clone, Serialize)]
pub struct FetchedEmail {
    pub id: Option<String>,
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// Epoch milliseconds
    pub received_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Api,
    Gas,
}

/// Pick the send transport. An explicit mode wins; `AUTO` (or nothing)
/// prefers the API when the account holds a refresh token.
pub fn resolve_send_mode(requested: Option<&str>, account: &Account) -> TransportMode {
    match requested.map(str::to_ascii_uppercase).as_deref() {
        Some("API") => TransportMode::Api,
        Some("GAS") => TransportMode::Gas,
        _ => {
            if account.has_refresh_token() {
                TransportMode::Api
            } else {
                TransportMode::Gas
            }
        }
    }
}

/// Pick the fetch transport. Unlike sending, a forced mode the account is
/// not configured for is an error rather than a doomed attempt.
pub fn resolve_fetch_mode(requested: Option<&str>, account: &Account) -> Result<TransportMode> {
    match requested.map(str::to_ascii_uppercase).as_deref() {
        Some("GAS") => {
            if !account.has_script_url() {
                return Err(anyhow!(
                    "Account {} has no Apps Script URL configured",
                    account.name
                ));
            }
            Ok(TransportMode::Gas)
        }
        Some("API") => {
            if !account.has_refresh_token() {
                return Err(anyhow!(
                    "Account {} has no Gmail API credentials configured",
                    account.name
                ));
            }
            Ok(TransportMode::Api)
        }
        _ => {
            if account.has_refresh_token() {
                Ok(TransportMode::Api)
            } else if account.has_script_url() {
                Ok(TransportMode::Gas)
            } else {
                Err(anyhow!(
                    "Account {} has neither Gmail API credentials nor an Apps Script URL",
                    account.name
                ))
            }
        }
    }
}

/// Resolve a bearer token for the Gmail API. Accounts created from a raw
/// access token store it in the refresh_token column without a client id,
/// in which case the stored value is used directly.
pub async fn access_token_for(config: &AppConfig, account: &Account) -> Result<String> {
    let refresh_token = account
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("Account {} is missing a refresh token", account.name))?;

    let Some(client_id) = account.client_id.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(refresh_token.to_string());
    };

    let client_secret = account.client_secret.as_deref().unwrap_or_default();
    let token = refresh_access_token(
        &config.oauth_token_url,
        client_id,
        client_secret,
        refresh_token,
    )
    .await?;
    Ok(token.access_token)
}

/// Token an Apps Script deployment expects: the account's client_secret
/// column doubles as the script token, with a configurable fallback.
pub fn gas_token(config: &AppConfig, account: &Account) -> String {
    account
        .client_secret
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.gas_default_token.clone())
}

/// Send one message through the account's transport
pub async fn send_email(
    config: &AppConfig,
    account: &Account,
    to: &str,
    subject: &str,
    content: &str,
    mode: Option<&str>,
) -> Result<()> {
    match resolve_send_mode(mode, account) {
        TransportMode::Api => {
            let token = access_token_for(config, account).await?;
            gmail::send_message(&config.gmail_api_base_url, &token, to, subject, content).await
        }
        TransportMode::Gas => {
            gas::send_message(
                &account.script_url,
                &gas_token(config, account),
                to,
                subject,
                content,
            )
            .await
        }
    }
}

/// Fetch the newest messages for an account, optionally filtered
pub async fn fetch_emails(
    config: &AppConfig,
    account: &Account,
    limit: usize,
    filter: Option<&MailFilter>,
    mode: Option<&str>,
) -> Result<Vec<FetchedEmail>> {
    match resolve_fetch_mode(mode, account)? {
        TransportMode::Api => fetch_via_api(config, account, limit, filter).await,
        TransportMode::Gas => {
            gas::fetch_messages(
                &account.script_url,
                &gas_token(config, account),
                limit,
                filter,
            )
            .await
        }
    }
}

async fn fetch_via_api(
    config: &AppConfig,
    account: &Account,
    limit: usize,
    filter: Option<&MailFilter>,
) -> Result<Vec<FetchedEmail>> {
    let token = access_token_for(config, account).await?;
    let query = gmail::build_search_query(filter);
    let refs = gmail::list_messages(&config.gmail_api_base_url, &token, limit, &query).await?;

    // Fetch message details concurrently
    let mut tasks = JoinSet::new();
    for r in refs {
        tasks.spawn(gmail::fetch_message(
            config.gmail_api_base_url.clone(),
            token.clone(),
            r.id,
        ));
    }

    let mut emails = Vec::new();
    for joined in tasks.join_all().await {
        let message = match joined {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Skipping message fetch failure: {}", e);
                continue;
            }
        };
        // A message with no payload has nothing worth showing
        if message.payload.is_none() {
            continue;
        }
        emails.push(FetchedEmail {
            sender: gmail::header_value(&message, "From").unwrap_or_else(|| "Unknown".to_string()),
            subject: gmail::header_value(&message, "Subject")
                .unwrap_or_else(|| "(No Subject)".to_string()),
            body: message.snippet.clone().unwrap_or_default(),
            received_at: message
                .internal_date
                .as_deref()
                .and_then(|d| d.parse().ok())
                .unwrap_or_else(now_ms),
            id: Some(message.id),
        });
    }

    // JoinSet yields in completion order; restore newest-first
    emails.sort_by_key(|e| std::cmp::Reverse(e.received_at));
    Ok(emails)
}

/// Flatten a message body to a single line of display text. Links keep
/// their target as `text (url)`, remaining markup is stripped, and
/// whitespace collapses.
pub fn display_text(body: &str) -> String {
    let link_re = Regex::new(r#"(?is)<a[^>]+href=["'](.*?)["'][^>]*>(.*?)</a>"#).unwrap();
    let tag_re = Regex::new(r"<[^>]+>").unwrap();
    let space_re = Regex::new(r"\s+").unwrap();

    let text = link_re.replace_all(body, "$2 ($1)");
    let text = tag_re.replace_all(&text, "");
    let text = text.replace("&nbsp;", " ");
    space_re.replace_all(&text, " ").trim().to_string()
}
