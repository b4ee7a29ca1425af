//! Gmail API client for sending mail and reading a mailbox slice
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::transport::MailFilter;

/// Message and list structures from the Gmail API documentation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub snippet: Option<String>,
    pub payload: Option<MessagePayload>,
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub headers: Option<Vec<MessageHeader>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Serialize)]
struct SendMessageRequest {
    raw: String,
}

/// Find a header on a message by name, case-insensitively
pub fn header_value(message: &Message, name: &str) -> Option<String> {
    message
        .payload
        .as_ref()?
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Encode a subject line as an RFC 2047 encoded-word so non-ASCII
/// subjects survive the wire
fn encode_subject(subject: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
}

/// Build the base64url-encoded RFC 822 message the API expects in `raw`
fn build_raw_message(to: &str, subject: &str, body: &str) -> String {
    let lines = [
        format!("To: {}", to),
        format!("Subject: {}", encode_subject(subject)),
        String::from("Content-Type: text/plain; charset=\"UTF-8\""),
        String::new(),
        body.to_string(),
    ];
    URL_SAFE_NO_PAD.encode(lines.join("\r\n").as_bytes())
}

/// Send a plain text message as the authenticated user
pub async fn send_message(
    base_url: &str,
    access_token: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<(), anyhow::Error> {
    let subject = if subject.is_empty() { "No Subject" } else { subject };
    let body = if body.is_empty() { " " } else { body };

    let client = Client::new();
    let url = format!("{}/gmail/v1/users/me/messages/send", base_url);
    let res = client
        .post(&url)
        .bearer_auth(access_token)
        .json(&SendMessageRequest {
            raw: build_raw_message(to, subject, body),
        })
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| status.to_string());
        anyhow::bail!("Gmail send failed: {}", detail);
    }
    Ok(())
}

/// Build a Gmail search query from a rule's filters. With no filter the
/// query covers the inbox and spam so verification mail is not missed.
pub fn build_search_query(filter: Option<&MailFilter>) -> String {
    let Some(filter) = filter.filter(|f| !f.is_empty()) else {
        return "label:inbox OR label:spam".to_string();
    };

    let mut parts = Vec::new();
    if let Some(sender) = filter.sender.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("from:{}", sender));
    }
    if let Some(receiver) = filter.receiver.as_deref().filter(|r| !r.is_empty()) {
        parts.push(format!("to:{}", receiver));
    }
    let keywords = filter.body_keywords();
    if !keywords.is_empty() {
        let quoted = keywords
            .iter()
            .map(|k| format!("\"{}\"", k))
            .collect::<Vec<_>>()
            .join(" OR ");
        parts.push(format!("({})", quoted));
    }
    parts.join(" ")
}

/// List up to `limit` message ids matching the search query
/// curl -H "Authorization: Bearer $TOKEN" \
///   "https://gmail.googleapis.com/gmail/v1/users/me/messages?maxResults=5&q=..."
pub async fn list_messages(
    base_url: &str,
    access_token: &str,
    limit: usize,
    query: &str,
) -> Result<Vec<MessageRef>, anyhow::Error> {
    let client = Client::new();
    let url = format!(
        "{}/gmail/v1/users/me/messages?maxResults={}&q={}",
        base_url,
        limit,
        urlencoding::encode(query)
    );
    let res = client.get(&url).bearer_auth(access_token).send().await?;
    if !res.status().is_success() {
        // A bad query or scope mismatch reads as an empty mailbox
        tracing::warn!("Gmail list returned {}", res.status());
        return Ok(Vec::new());
    }
    let list: ListMessagesResponse = res.json().await?;
    Ok(list.messages.unwrap_or_default())
}

/// Fetch a single message with headers and snippet
pub async fn fetch_message(
    base_url: String,
    access_token: String,
    message_id: String,
) -> Result<Message, anyhow::Error> {
    let client = Client::new();
    let url = format!("{}/gmail/v1/users/me/messages/{}", base_url, message_id);
    let res = client.get(&url).bearer_auth(access_token).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Message fetch failed: {} ({})", status, text);
    }
    let message: Message = serde_json::from_str(&text)?;
    Ok(message)
}
