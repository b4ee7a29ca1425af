//! Integration tests for the send tasks API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::{auth_header, body_to_string, test_app};

    fn authed(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder
            .header("authorization", auth_header())
            .header("content-type", "application/json")
    }

    /// Creates a GAS account pointed at the given script URL and returns
    /// its id
    async fn create_gas_account(app: &axum::Router, name: &str, script_url: &str) {
        let response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/accounts").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "name": name,
                            "email": format!("{}@example.com", name),
                            "type": "GAS",
                            "gas_url": script_url
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Tests a scheduled task lands pending with the base date as its due
    /// time and the account name joined in
    #[tokio::test]
    #[serial]
    async fn it_schedules_a_task_for_its_base_date() {
        let app = test_app().await;
        create_gas_account(&app, "sender1", "https://script.google.com/macros/s/x/exec").await;

        let response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "account_id": 1,
                            "to_email": "to@example.com",
                            "subject": "Scheduled hello",
                            "content": "See you in 2030",
                            "base_date": "2030-01-01 00:00:00",
                            "is_loop": 0
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["total"], 1);
        let task = &parsed["data"][0];
        assert_eq!(task["status"], "pending");
        assert_eq!(task["account_name"], "sender1");
        assert_eq!(task["execution_mode"], "AUTO");
        // 2030-01-01T00:00:00Z
        assert_eq!(task["next_run_at"], 1893456000000i64);
    }

    /// Tests a task without a base date is scheduled from its delay config
    #[tokio::test]
    #[serial]
    async fn it_schedules_a_task_from_delay_config() {
        let app = test_app().await;
        create_gas_account(&app, "sender1", "https://script.google.com/macros/s/x/exec").await;

        let before = chrono::Utc::now().timestamp_millis();
        let _response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "account_id": 1,
                            "to_email": "to@example.com",
                            "subject": "Delayed",
                            "content": "soon",
                            "delay_config": "30,minute",
                            "is_loop": true
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        let next_run = parsed["data"][0]["next_run_at"].as_i64().unwrap();
        let thirty_minutes = 30 * 60 * 1000;
        assert!(next_run >= before + thirty_minutes);
        assert!(next_run <= before + thirty_minutes + 60_000);
        assert_eq!(parsed["data"][0]["is_loop"], 1);
    }

    /// Tests identical tasks are skipped regardless of status
    #[tokio::test]
    #[serial]
    async fn it_skips_duplicate_tasks() {
        let app = test_app().await;
        create_gas_account(&app, "sender1", "https://script.google.com/macros/s/x/exec").await;

        let task = serde_json::json!({
            "account_id": 1,
            "to_email": "dup@example.com",
            "subject": "Same",
            "content": "Same body",
            "base_date": "2030-01-01 00:00:00"
        });

        let _response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(task.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(task.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["imported"], 0);
        let skipped = parsed["skipped"].as_array().unwrap();
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].as_str().unwrap().contains("dup@example.com"));
    }

    /// Tests an immediate send goes straight through the transport and
    /// stores nothing
    #[tokio::test]
    #[serial]
    async fn it_sends_immediately_without_queueing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/exec")
            .match_query(mockito::Matcher::UrlEncoded(
                "token".into(),
                "123456".into(),
            ))
            .with_status(200)
            .with_body("OK")
            .create_async()
            .await;

        let app = test_app().await;
        create_gas_account(&app, "sender1", &format!("{}/exec", server.url())).await;

        let response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "immediate": true,
                            "account_id": 1,
                            "to_email": "now@example.com",
                            "subject": "Right now",
                            "content": "Immediate body"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["ok"], true);
        mock.assert_async().await;

        // Nothing was queued
        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["total"], 0);
    }

    /// Tests an immediate send for a missing account reports the error
    #[tokio::test]
    #[serial]
    async fn it_reports_missing_account_on_immediate_send() {
        let app = test_app().await;

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "immediate": true,
                            "account_id": 42,
                            "to_email": "now@example.com"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["ok"], false);
        assert_eq!(parsed["error"], "Account not found");
    }

    /// Tests manually executing a stored one-shot task marks it success
    #[tokio::test]
    #[serial]
    async fn it_executes_a_task_on_demand() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/exec")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("Sent")
            .create_async()
            .await;

        let app = test_app().await;
        create_gas_account(&app, "sender1", &format!("{}/exec", server.url())).await;

        let _response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "account_id": 1,
                            "to_email": "exec@example.com",
                            "subject": "On demand",
                            "content": "Run me",
                            "base_date": "2030-01-01 00:00:00"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("PUT"))
                    .body(Body::from(
                        serde_json::json!({ "action": "execute", "id": 1 }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["ok"], true);

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["data"][0]["status"], "success");
        assert_eq!(parsed["data"][0]["success_count"], 1);
    }

    /// Tests a failed execute records the error on the task
    #[tokio::test]
    #[serial]
    async fn it_records_the_error_when_execute_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/exec")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("Error: the script blew up")
            .create_async()
            .await;

        let app = test_app().await;
        create_gas_account(&app, "sender1", &format!("{}/exec", server.url())).await;

        let _response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "account_id": 1,
                            "to_email": "fail@example.com",
                            "subject": "Will fail",
                            "content": "x",
                            "base_date": "2030-01-01 00:00:00"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("PUT"))
                    .body(Body::from(
                        serde_json::json!({ "action": "execute", "id": 1 }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["ok"], false);

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        let task = &parsed["data"][0];
        assert_eq!(task["status"], "error");
        assert_eq!(task["fail_count"], 1);
        assert!(
            task["last_error"]
                .as_str()
                .unwrap()
                .contains("the script blew up")
        );
    }

    /// Tests executing a task that does not exist
    #[tokio::test]
    #[serial]
    async fn it_reports_a_missing_task_on_execute() {
        let app = test_app().await;

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("PUT"))
                    .body(Body::from(
                        serde_json::json!({ "action": "execute", "id": 99 }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["error"], "Task not found");
    }

    /// Tests updating a task resets it to pending with a fresh schedule
    #[tokio::test]
    #[serial]
    async fn it_updates_a_task_and_resets_status() {
        let app = test_app().await;
        create_gas_account(&app, "sender1", "https://script.google.com/macros/s/x/exec").await;

        let _response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!({
                            "account_id": 1,
                            "to_email": "old@example.com",
                            "subject": "Old",
                            "content": "old",
                            "base_date": "2030-01-01 00:00:00"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("PUT"))
                    .body(Body::from(
                        serde_json::json!({
                            "id": 1,
                            "account_id": 1,
                            "to_email": "new@example.com",
                            "subject": "New",
                            "content": "new",
                            "base_date": "2031-06-01 12:00:00",
                            "is_loop": 1,
                            "execution_mode": "GAS"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        let task = &parsed["data"][0];
        assert_eq!(task["to_email"], "new@example.com");
        assert_eq!(task["status"], "pending");
        assert_eq!(task["is_loop"], 1);
        assert_eq!(task["execution_mode"], "GAS");
        // 2031-06-01T12:00:00Z
        assert_eq!(task["next_run_at"], 1938081600000i64);
    }

    /// Tests searching and deleting tasks
    #[tokio::test]
    #[serial]
    async fn it_searches_and_deletes_tasks() {
        let app = test_app().await;
        create_gas_account(&app, "sender1", "https://script.google.com/macros/s/x/exec").await;

        let _response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks").method("POST"))
                    .body(Body::from(
                        serde_json::json!([
                            {
                                "account_id": 1,
                                "to_email": "findme@example.com",
                                "subject": "Interesting",
                                "content": "a",
                                "base_date": "2030-01-01 00:00:00"
                            },
                            {
                                "account_id": 1,
                                "to_email": "other@example.com",
                                "subject": "Boring",
                                "content": "b",
                                "base_date": "2030-01-01 00:00:00"
                            }
                        ])
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/tasks?q=findme"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["total"], 1);
        let id = parsed["data"][0]["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(
                authed(
                    Request::builder()
                        .uri(format!("/api/tasks?id={}", id))
                        .method("DELETE"),
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                authed(Request::builder().uri("/api/tasks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["total"], 1);
        assert_eq!(parsed["data"][0]["subject"], "Boring");
    }
}
