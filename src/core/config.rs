use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub admin_username: String,
    pub admin_password: String,
    pub display_utc_offset_hours: i32,
    pub gas_default_token: String,
    pub gmail_api_base_url: String,
    pub oauth_token_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("MAILBRIDGE_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path);
        let admin_username = env::var("MAILBRIDGE_ADMIN_USERNAME")
            .expect("Missing env var MAILBRIDGE_ADMIN_USERNAME");
        let admin_password = env::var("MAILBRIDGE_ADMIN_PASSWORD")
            .expect("Missing env var MAILBRIDGE_ADMIN_PASSWORD");
        let display_utc_offset_hours = env::var("MAILBRIDGE_DISPLAY_UTC_OFFSET")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8);
        let gas_default_token =
            env::var("MAILBRIDGE_GAS_DEFAULT_TOKEN").unwrap_or_else(|_| "123456".to_string());
        let gmail_api_base_url = env::var("MAILBRIDGE_GMAIL_API_URL")
            .unwrap_or_else(|_| "https://gmail.googleapis.com".to_string());
        let oauth_token_url = env::var("MAILBRIDGE_OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string());

        Self {
            storage_path,
            db_path,
            admin_username,
            admin_password,
            display_utc_offset_hours,
            gas_default_token,
            gmail_api_base_url,
            oauth_token_url,
        }
    }
}
