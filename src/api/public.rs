//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};

// Errors

pub struct ApiError(anyhow::Error);

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        tracing::error!("{}", self.0);

        // Respond with an error status
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Shared request/response shapes

/// Endpoints that import records accept a single object or a batch
#[derive(Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Standard paginated list envelope
#[derive(Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let limit = limit.max(1);
        let total_pages = ((total + limit - 1) / limit).max(1);
        Self {
            data,
            total,
            page,
            total_pages,
        }
    }
}

// Re-export public types from each route

pub mod accounts {
    pub use crate::api::routes::accounts::public::*;
}

pub mod emails {
    pub use crate::api::routes::emails::public::*;
}

pub mod groups {
    pub use crate::api::routes::groups::public::*;
}

pub mod rules {
    pub use crate::api::routes::rules::public::*;
}

pub mod tasks {
    pub use crate::api::routes::tasks::public::*;
}
