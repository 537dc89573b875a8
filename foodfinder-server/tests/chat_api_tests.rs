//! End-to-end tests of `POST /api/chat` against a mocked Generative Language API.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use server::{
    app_state::AppState,
    server::{create_app_router, metrics_handle},
};
use shared::config::server::{Config, Profile};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn reply_body(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }] })
}

fn chat_body(text: &str) -> Value {
    json!({
        "messages": [
            { "role": "assistant", "content": "Any preferences?" },
            { "role": "user", "content": text }
        ]
    })
}

fn app(upstream: &MockServer, profile: Profile, forced_model: Option<&str>) -> TestServer {
    let mut config = Config::default_for_profile(profile);
    config.gemini.api_key = Some("integration-key".into());
    config.gemini.base_url = upstream.uri();
    config.gemini.model = forced_model.map(ToString::to_string);
    let config = Arc::new(config);

    let state = AppState::from_config(config.clone()).expect("state builds");
    TestServer::new(create_app_router(Arc::new(state), config, metrics_handle()))
        .expect("test server")
}

async fn mount_listing(upstream: &MockServer, version: &str, names: &[&str]) {
    let models: Vec<Value> = names
        .iter()
        .map(|name| json!({ "name": name, "supportedGenerationMethods": ["generateContent"] }))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/{version}/models")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
        .mount(upstream)
        .await;
}

async fn mount_generate(upstream: &MockServer, version: &str, model: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(format!("/{version}/models/{model}:generateContent")))
        .and(query_param("key", "integration-key"))
        .respond_with(response)
        .mount(upstream)
        .await;
}

async fn generate_calls(upstream: &MockServer) -> Vec<String> {
    upstream
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path().ends_with(":generateContent"))
        .map(|request| request.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn forced_model_answers_directly() {
    let upstream = MockServer::start().await;
    mount_generate(
        &upstream,
        "v1",
        "my-model",
        ResponseTemplate::new(200).set_body_json(reply_body("Try the ramen.")),
    )
    .await;

    let server = app(&upstream, Profile::Dev, Some("my-model"));
    let response = server.post("/api/chat").json(&chat_body("Noodles?")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "reply": "Try the ramen." }));
    assert_eq!(generate_calls(&upstream).await, vec!["/v1/models/my-model:generateContent"]);
}

#[tokio::test]
async fn forced_model_server_error_aborts_with_summary() {
    let upstream = MockServer::start().await;
    mount_generate(&upstream, "v1", "my-model", ResponseTemplate::new(500)).await;
    mount_generate(&upstream, "v1beta", "my-model", ResponseTemplate::new(404)).await;
    mount_listing(&upstream, "v1", &["models/gemini-2.0-flash"]).await;

    let server = app(&upstream, Profile::Dev, Some("my-model"));
    let response = server.post("/api/chat").json(&chat_body("Pizza?")).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"], "Gemini API request failed.");
    assert_eq!(body["details"], "Forced model failed: my-model (v1:500,v1beta:404)");
    assert_eq!(body["debug"]["forcedModel"], "my-model");
    assert_eq!(body["debug"]["attempts"][0]["phase"], "forced-model");
    assert_eq!(generate_calls(&upstream).await.len(), 2);
}

#[tokio::test]
async fn discovered_model_is_cached_for_the_next_request() {
    let upstream = MockServer::start().await;
    mount_listing(
        &upstream,
        "v1",
        &["models/gemini-exp-9000", "models/gemini-1.5-flash"],
    )
    .await;
    mount_generate(
        &upstream,
        "v1",
        "gemini-1.5-flash",
        ResponseTemplate::new(200).set_body_json(reply_body("Dal makhani is great.")),
    )
    .await;

    let server = app(&upstream, Profile::Dev, None);

    let first = server.post("/api/chat").json(&chat_body("Vegetarian options")).await;
    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(first.json::<Value>()["reply"], "Dal makhani is great.");
    assert_eq!(
        generate_calls(&upstream).await,
        vec!["/v1/models/gemini-1.5-flash:generateContent"]
    );

    upstream.reset().await;
    mount_generate(
        &upstream,
        "v1",
        "gemini-1.5-flash",
        ResponseTemplate::new(200).set_body_json(reply_body("Paneer tikka too.")),
    )
    .await;

    let second = server.post("/api/chat").json(&chat_body("More?")).await;
    assert_eq!(second.json::<Value>()["reply"], "Paneer tikka too.");
    let requests = upstream.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1, "cached choice skips discovery");
}

#[tokio::test]
async fn fallback_list_is_used_when_listing_fails() {
    let upstream = MockServer::start().await;
    mount_generate(
        &upstream,
        "v1beta",
        "gemini-1.5-pro",
        ResponseTemplate::new(200).set_body_json(reply_body("Biryani at Paradise.")),
    )
    .await;

    let server = app(&upstream, Profile::Dev, None);
    let response = server.post("/api/chat").json(&chat_body("Best biryani nearby?")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["reply"], "Biryani at Paradise.");
}

#[tokio::test]
async fn quota_exhaustion_maps_to_429() {
    let upstream = MockServer::start().await;
    mount_listing(&upstream, "v1", &["models/gemini-2.0-flash"]).await;
    mount_generate(
        &upstream,
        "v1",
        "gemini-2.0-flash",
        ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"),
    )
    .await;

    let server = app(&upstream, Profile::Dev, None);
    let response = server.post("/api/chat").json(&chat_body("Lunch?")).await;

    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(
        body["details"],
        "Gemini quota exceeded for this API key. Check your plan/billing in Google AI Studio (or wait and try again)."
    );
    let attempts = body["debug"]["attempts"].as_array().unwrap();
    assert!(attempts.len() <= 10);
    assert_eq!(attempts[1]["phase"], "generate-with-candidate");
    assert_eq!(attempts[1]["bodyText"], "RESOURCE_EXHAUSTED");
    assert!(!body.to_string().contains("integration-key"));
}

#[tokio::test]
async fn prod_profile_omits_debug_block() {
    let upstream = MockServer::start().await;

    let server = app(&upstream, Profile::Prod, None);
    let response = server.post("/api/chat").json(&chat_body("Anything?")).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        response.json::<Value>(),
        json!({
            "error": "Gemini API request failed.",
            "details": "No supported Gemini model found for this API key."
        })
    );
}

#[tokio::test]
async fn readiness_reflects_configured_key() {
    let upstream = MockServer::start().await;
    let server = app(&upstream, Profile::Test, None);

    let response = server.get("/readyz").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "ready");
}
