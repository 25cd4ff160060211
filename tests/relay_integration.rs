//! End-to-end tests for the relay HTTP surface, driving the router with
//! real `sh` worker processes.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use magi_relay::config::RelayConfig;
use magi_relay::server::RelayServer;

fn router_with_worker(script: &str, timeout_ms: u64) -> Router {
    let config = RelayConfig {
        worker_command: "sh".to_string(),
        worker_args: vec!["-c".to_string(), script.to_string()],
        process_timeout_ms: timeout_ms,
        ..RelayConfig::default()
    };
    RelayServer::new(config).router()
}

async fn post_invocation(router: Router, payload: &str) -> (StatusCode, String, Option<String>) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/invocations")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned(), content_type)
}

#[tokio::test]
async fn worker_lines_arrive_as_sse_data_frames() {
    let router = router_with_worker(r#"printf '{"a":1}\n{"b":2}\n'"#, 5_000);
    let (status, body, content_type) = post_invocation(router, "{}").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));
    assert!(body.contains("data: {\"a\":1}\n\n"));
    assert!(body.contains("data: {\"b\":2}\n\n"));
    assert!(!body.contains("WORKER_"), "clean run must not emit errors");
}

#[tokio::test]
async fn stream_response_disables_caching() {
    let router = router_with_worker("printf 'ok\\n'", 5_000);
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/invocations")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
}

#[tokio::test]
async fn request_payload_is_forwarded_verbatim() {
    let router = router_with_worker("cat", 5_000);
    let (status, body, _) = post_invocation(router, r#"{"question":"deploy the new model?"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"data: {"question":"deploy the new model?"}"#));
}

#[tokio::test]
async fn abnormal_exit_surfaces_structured_error_event() {
    let router = router_with_worker("exit 3", 5_000);
    let (status, body, _) = post_invocation(router, "{}").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("WORKER_EXIT_ERROR"));
    assert!(body.contains("\"exitCode\":3"));
}

#[tokio::test]
async fn timeout_surfaces_structured_error_event() {
    let router = router_with_worker("sleep 5", 200);
    let (status, body, _) = post_invocation(router, "{}").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("WORKER_TIMEOUT"));
    assert!(body.contains("\"timeoutMs\":200"));
}

#[tokio::test]
async fn malformed_payload_is_rejected_before_spawn() {
    let router = router_with_worker("printf 'never runs\\n'", 5_000);
    let (status, body, content_type) = post_invocation(router, "definitely not json").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(content_type.unwrap().starts_with("application/json"));

    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["error"], "Invalid request payload");
    assert!(value["details"].as_str().is_some());
    assert!(!body.contains("never runs"));
}

#[tokio::test]
async fn preflight_carries_cors_headers() {
    let router = router_with_worker("true", 5_000);
    let response = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/invocations")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn health_reports_worker_configuration() {
    let router = router_with_worker("true", 5_000);
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "healthy");
    assert_eq!(value["workerCommand"], "sh");
}

#[tokio::test]
async fn welcome_lists_endpoints() {
    let router = router_with_worker("true", 5_000);
    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["service"], "MAGI Decision System");
    assert!(value["endpoints"].get("POST /invocations").is_some());
}

#[tokio::test]
async fn ping_answers() {
    let router = router_with_worker("true", 5_000);
    let response = router
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stderr_diagnostics_do_not_terminate_the_stream() {
    let router = router_with_worker(
        r#"echo 'model cold start' >&2; printf '{"decision":"APPROVED"}\n'"#,
        5_000,
    );
    let (status, body, _) = post_invocation(router, "{}").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("WORKER_RUNTIME_ERROR"));
    assert!(body.contains("model cold start"));
    assert!(body.contains(r#"data: {"decision":"APPROVED"}"#));
    assert!(!body.contains("WORKER_EXIT_ERROR"));
}
