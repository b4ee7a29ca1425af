//! OAuth2 refresh-token flow for the Gmail API
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

/// Exchange a long-lived refresh token for a short-lived access token
pub async fn refresh_access_token(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthToken, anyhow::Error> {
    let client = Client::new();
    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    let res = client.post(token_url).form(&params).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Token refresh failed: {} ({})", status, text);
    }

    // Google can return 200 with an error payload
    let body: serde_json::Value = serde_json::from_str(&text)?;
    if body.get("error").is_some() {
        anyhow::bail!("Token refresh failed: {}", text);
    }

    let token: OAuthToken = serde_json::from_value(body)?;
    Ok(token)
}
