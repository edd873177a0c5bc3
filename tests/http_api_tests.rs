//! HTTP API Tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`.
//!
//! Run: cargo nextest run --test http_api_tests --features server

#![cfg(feature = "server")]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use usage_meter::MeterEngine;
use usage_meter::server::{AppState, create_router};

fn app() -> Router {
    create_router(Arc::new(AppState::new(MeterEngine::in_memory())))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn start_trial(app: &Router, account: &str) -> String {
    let (status, body) = post(
        app,
        "/session/start",
        json!({
            "accountId": account,
            "tier": "trial",
            "mode": "friend",
            "usesAudioChannel": false,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["sessionId"].as_str().unwrap().to_string()
}

fn trial_tick(session_id: &str, delta: i64) -> Value {
    json!({
        "sessionId": session_id,
        "deltaSeconds": delta,
        "isActive": true,
        "tier": "trial",
        "mode": "friend",
    })
}

// =============================================================================
// Sessions
// =============================================================================

mod session_routes {
    use super::*;

    #[tokio::test]
    async fn test_start_returns_cap_and_budgets() {
        let app = app();
        let (status, body) = post(
            &app,
            "/session/start",
            json!({
                "accountId": "acct-1",
                "tier": "member_romantic",
                "mode": "romantic",
                "usesAudioChannel": true,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["capSeconds"], 1800);
        assert_eq!(body["includedRemaining30d"], 2700);
        assert_eq!(body["purchasedTextSeconds"], 0);
        assert_eq!(body["purchasedTtsSeconds"], 0);
        assert!(body["sessionId"].is_string());
    }

    #[tokio::test]
    async fn test_start_not_entitled_is_403() {
        let app = app();
        let (status, body) = post(
            &app,
            "/session/start",
            json!({"accountId": "acct-2", "tier": "trial", "mode": "villain"}),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NotEntitled");
        assert!(body["error"].as_str().unwrap().contains("trial"));
    }

    #[tokio::test]
    async fn test_blank_account_is_400() {
        let app = app();
        let (status, body) = post(
            &app,
            "/session/start",
            json!({"accountId": "   ", "tier": "trial", "mode": "friend"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_tick_to_cap_then_402() {
        let app = app();
        let session_id = start_trial(&app, "acct-3").await;

        let (status, body) = post(&app, "/session/tick", trial_tick(&session_id, 600)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remainingSessionSeconds"], 0);
        assert_eq!(body["includedRemaining30d"], 0);

        let (status, body) = post(&app, "/session/tick", trial_tick(&session_id, 1)).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "SessionCapReached");
    }

    #[tokio::test]
    async fn test_tick_unknown_session_is_404() {
        let app = app();
        let unknown = uuid::Uuid::new_v4().to_string();
        let (status, body) = post(&app, "/session/tick", trial_tick(&unknown, 5)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NotFound");
    }

    #[tokio::test]
    async fn test_malformed_tick_body_is_400() {
        let app = app();
        let (status, body) = post(&app, "/session/tick", json!({"sessionId": "nope"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_stop_and_status() {
        let app = app();
        let session_id = start_trial(&app, "acct-4").await;
        post(&app, "/session/tick", trial_tick(&session_id, 45)).await;

        let (status, body) = get(&app, &format!("/session/{session_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "active");
        assert_eq!(body["session"]["activeSeconds"], 45);
        assert_eq!(body["remainingSessionSeconds"], 555);

        let (status, body) = post(&app, "/session/stop", json!({"sessionId": session_id})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["stoppedAt"].is_string());

        let (status, body) = get(&app, "/session/not-a-uuid").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NotFound");
    }

    #[tokio::test]
    async fn test_non_uuid_session_id_is_404() {
        let app = app();

        let (status, body) = post(&app, "/session/tick", trial_tick("nope", 5)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NotFound");
        assert!(body["error"].as_str().unwrap().contains("nope"));

        let (status, body) = post(&app, "/session/stop", json!({"sessionId": "nope"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NotFound");
    }
}

// =============================================================================
// Credit and Usage
// =============================================================================

mod credit_routes {
    use super::*;

    #[tokio::test]
    async fn test_grant_and_summary() {
        let app = app();
        let (status, body) = post(
            &app,
            "/credit/grant",
            json!({"accountId": "buyer", "sku": "text_30m_299", "channel": "text"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["secondsGranted"], 1800);
        assert!(body["grantId"].is_string());
        assert!(body["expiresAt"].is_string());

        let (status, body) = get(&app, "/usage/summary?accountId=buyer&tier=trial").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["includedRemaining30d"], 600);
        assert_eq!(body["purchasedTextSeconds"], 1800);
        assert_eq!(body["purchasedTtsSeconds"], 0);
    }

    #[tokio::test]
    async fn test_unknown_sku_is_400() {
        let app = app();
        let (status, body) = post(
            &app,
            "/credit/grant",
            json!({"accountId": "buyer", "sku": "bogus", "channel": "text"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "UnknownSku");
    }

    #[tokio::test]
    async fn test_summary_requires_account() {
        let app = app();
        let (status, body) = get(&app, "/usage/summary?tier=trial").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_catalog_and_health() {
        let app = app();
        let (status, body) = get(&app, "/credit/catalog").await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 6);
        assert!(entries.iter().any(|e| e["sku"] == "tts_60m_1499" && e["seconds"] == 3600));

        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ledger"], "memory");
    }
}
