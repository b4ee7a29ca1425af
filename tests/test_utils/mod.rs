//! Test utilities for integration tests
use std::env;
use std::fs;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use axum::Router;
use axum::body::Body;
use base64::{Engine as _, engine::general_purpose::STANDARD};

use mailbridge::api::AppState;
use mailbridge::api::app;
use mailbridge::core::AppConfig;
use mailbridge::core::db::{async_db, initialize_db};

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "test-password";

/// `Authorization` header value for the test admin user
pub fn auth_header() -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", TEST_USERNAME, TEST_PASSWORD))
    )
}

pub fn test_config(storage_path: &str, db_path: &str) -> AppConfig {
    AppConfig {
        storage_path: storage_path.to_string(),
        db_path: db_path.to_string(),
        admin_username: TEST_USERNAME.to_string(),
        admin_password: TEST_PASSWORD.to_string(),
        display_utc_offset_hours: 8,
        gas_default_token: "123456".to_string(),
        gmail_api_base_url: "https://gmail.googleapis.com".to_string(),
        oauth_token_url: "https://oauth2.googleapis.com/token".to_string(),
    }
}

/// Creates a test application router backed by a throwaway database in a
/// unique temporary directory, so tests never share state.
pub async fn test_app() -> Router {
    // Nanosecond timestamps keep concurrently created test dirs apart
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .to_string();
    let dir = env::temp_dir().join(format!("mailbridge-test-{}", ts));
    let db_dir = dir.join("db");
    fs::create_dir_all(&db_dir).expect("Failed to create db directory");

    let db_path = db_dir.to_str().unwrap();
    let db = async_db(db_path)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to initialize db");
        Ok(())
    })
    .await
    .unwrap();

    let app_config = test_config(&dir.display().to_string(), db_path);
    let app_state = AppState::new(db, app_config);
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
