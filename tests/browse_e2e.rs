//! End-to-end browse scenarios against a real Chromium.
//!
//! Run with:
//! ```bash
//! export DECAP_USE_REAL_CHROME=1
//! cargo test --test browse_e2e -- --nocapture
//! ```

use std::env;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use cdp_driver::DriverConfig;
use decap::server::{router, AppState};
use decap::sessions::SessionManager;
use decap::NEW_BROWSE_PATH;

fn should_run_real_tests() -> bool {
    env::var("DECAP_USE_REAL_CHROME")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn real_app() -> axum::Router {
    let mut config = DriverConfig::default();
    config.headless = true;
    router(AppState {
        sessions: SessionManager::spawn(config),
    })
}

fn browse_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(NEW_BROWSE_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json response")
}

#[tokio::test]
async fn minimal_navigate_and_capture() {
    if !should_run_real_tests() {
        eprintln!("skipping real browser test (DECAP_USE_REAL_CHROME not set)");
        return;
    }

    let app = real_app();
    let response = app
        .oneshot(browse_request(serde_json::json!({
            "global_render_delay": "1s",
            "query": [
                {"actions": [["navigate", "data:text/html,<h1>decap</h1>"], ["outer_html"]]}
            ]
        })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["err"], serde_json::json!([""]));
    assert_eq!(payload["out"][0].as_array().expect("out[0]").len(), 1);
    assert!(payload["out"][0][0].as_str().expect("html").contains("decap"));
    assert!(payload.get("tab_id").is_none());
    assert!(payload.get("window_id").is_none());
}

#[tokio::test]
async fn window_reuse_round_trips_the_session_id() {
    if !should_run_real_tests() {
        eprintln!("skipping real browser test (DECAP_USE_REAL_CHROME not set)");
        return;
    }

    let app = real_app();

    let response = app
        .clone()
        .oneshot(browse_request(serde_json::json!({
            "global_render_delay": "1s",
            "reuse_window": true,
            "query": [
                {"actions": [["navigate", "data:text/html,<p>first</p>"], ["outer_html"]]}
            ]
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let first = json_body(response).await;
    let window_id = first["window_id"].as_str().expect("window id").to_string();
    assert_eq!(window_id.len(), 8);

    let response = app
        .oneshot(browse_request(serde_json::json!({
            "global_render_delay": "1s",
            "sessionid": window_id,
            "reuse_window": true,
            "query": [
                {"actions": [["navigate", "data:text/html,<p>second</p>"], ["outer_html"]]}
            ]
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let second = json_body(response).await;
    assert_eq!(second["window_id"].as_str(), Some(window_id.as_str()));
}
