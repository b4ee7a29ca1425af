use std::sync::{Arc, RwLock};

use axum::{Router, middleware, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::auth;
use super::routes;
use crate::api::state::AppState;
use crate::core::{AppConfig, db::async_db};
use crate::jobs::{SendDueTasks, spawn_periodic_job};

pub fn app(shared_state: Arc<RwLock<AppState>>) -> Router {
    let cors = CorsLayer::permissive();

    // Everything under /api requires the admin credentials
    let admin_api = routes::router().layer(middleware::from_fn_with_state(
        Arc::clone(&shared_state),
        auth::require_admin,
    ));

    Router::new()
        .nest("/api", admin_api)
        // Public short-link queries live at the root
        .route("/", get(routes::query::root_handler))
        .route("/{code}", get(routes::query::query_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::clone(&shared_state))
}

// Run the server
pub async fn serve(host: String, port: String, config: AppConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // axum logs rejections from built-in extractors with the `axum::rejection`
                // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
                format! {
                    "{}=debug,tower_http=debug,axum::rejection=trace",
                    env!("CARGO_CRATE_NAME")
                }
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = async_db(&config.db_path)
        .await
        .expect("Failed to connect to async db");

    let app_state = AppState::new(db.clone(), config.clone());
    let shared_state = Arc::new(RwLock::new(app_state));
    let app = app(Arc::clone(&shared_state));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .unwrap();

    tracing::debug!(
        "Server started. Listening on {}",
        listener.local_addr().unwrap()
    );

    // Run the send task executor in its own tokio task in a loop
    spawn_periodic_job(config, db, SendDueTasks);

    axum::serve(listener, app).await.unwrap();
}
