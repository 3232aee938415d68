//! Router tests through `tower::ServiceExt::oneshot`.
//!
//! The pool is lazy: none of these requests reach the database.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use liveshop_integration_tests::{VERIFY_TOKEN, facebook_config, sign, test_app, test_config};

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

// ============================================================================
// Health & Security Headers
// ============================================================================

#[tokio::test]
async fn test_health_is_ok() {
    let response = test_app(test_config()).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let response = test_app(test_config()).oneshot(get("/health")).await.unwrap();
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_api_requires_login() {
    for uri in [
        "/api/auth/me",
        "/api/customers",
        "/api/live-sessions",
        "/api/live-phases/1/products",
        "/api/purchase-orders",
    ] {
        let response = test_app(test_config()).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_pages_redirect_to_login() {
    let response = test_app(test_config())
        .oneshot(get("/phases/1/board"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_login_page_renders() {
    let response = test_app(test_config()).oneshot(get("/login")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains(r#"action="/login""#));
    assert!(body.contains(r#"name="password""#));
}

// ============================================================================
// Facebook Webhook
// ============================================================================

fn webhook_config() -> liveshop_admin::config::AppConfig {
    let mut config = test_config();
    config.facebook = Some(facebook_config("http://127.0.0.1:9"));
    config
}

#[tokio::test]
async fn test_webhook_handshake_echoes_challenge() {
    let uri = format!(
        "/webhooks/facebook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1158201444"
    );
    let response = test_app(webhook_config()).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "1158201444");
}

#[tokio::test]
async fn test_webhook_handshake_rejects_wrong_token() {
    let response = test_app(webhook_config())
        .oneshot(get(
            "/webhooks/facebook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_unconfigured_is_forbidden() {
    let uri = format!(
        "/webhooks/facebook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1"
    );
    let response = test_app(test_config()).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

fn post_webhook(body: &'static str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/facebook")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let body = r#"{"object":"page","entry":[]}"#;

    let unsigned = test_app(webhook_config())
        .oneshot(post_webhook(body, None))
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let forged = test_app(webhook_config())
        .oneshot(post_webhook(body, Some(format!("sha256={}", "0".repeat(64)))))
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_accepts_signed_delivery_without_comments() {
    // A reaction change touches no video, so no phase lookup happens.
    let body = r#"{"object":"page","entry":[{"id":"1001","changes":[{"field":"feed","value":{"item":"reaction","post_id":"1001_555"}}]}]}"#;

    let response = test_app(webhook_config())
        .oneshot(post_webhook(body, Some(sign(body.as_bytes()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "EVENT_RECEIVED");
}

#[tokio::test]
async fn test_webhook_rejects_signed_garbage() {
    let body = "not json";

    let response = test_app(webhook_config())
        .oneshot(post_webhook(body, Some(sign(body.as_bytes()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
