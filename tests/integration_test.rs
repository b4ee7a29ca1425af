//! Integration tests for authentication and the login endpoint

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::{auth_header, body_to_string, test_app};

    /// Tests login succeeds with the right credentials
    #[tokio::test]
    #[serial]
    async fn it_logs_in_with_valid_credentials() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/login")
                    .method("POST")
                    .header("authorization", auth_header())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("success"));
    }

    /// Tests login rejects a wrong password
    #[tokio::test]
    #[serial]
    async fn it_rejects_wrong_credentials() {
        let app = test_app().await;

        let bogus = format!("Basic {}", STANDARD.encode("admin:wrong-password"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/login")
                    .method("POST")
                    .header("authorization", bogus)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    /// Tests login rejects a missing header
    #[tokio::test]
    #[serial]
    async fn it_rejects_missing_credentials() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/login")
                    .method("POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("Unauthorized"));
    }

    /// Tests a malformed Authorization header is treated as unauthorized
    #[tokio::test]
    #[serial]
    async fn it_rejects_malformed_auth_headers() {
        let app = test_app().await;

        for header in ["Bearer whatever", "Basic not!base64", "Basic"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/api/accounts")
                        .header("authorization", header)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    /// Tests every admin route sits behind the auth middleware
    #[tokio::test]
    #[serial]
    async fn it_guards_all_admin_routes() {
        let app = test_app().await;

        for uri in [
            "/api/accounts",
            "/api/groups",
            "/api/rules",
            "/api/tasks",
            "/api/emails",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
