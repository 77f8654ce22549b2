//! Integration tests for the completion sweep: throttling, per-model
//! fallback, and exhaustion, against a wiremock upstream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use primer_client::{CompletionApi, Orchestrator, RateGovernor};
use primer_types::ModelCatalog;

const PREFERRED: &str = "llama-3.3-70b-versatile";

/// The shared client is https-only; mock servers speak plain http.
fn plain_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    orchestrator_with_timeout(server, Duration::from_secs(5))
}

fn orchestrator_with_timeout(server: &MockServer, timeout: Duration) -> Orchestrator {
    let api =
        CompletionApi::new(server.uri(), "test-key", timeout).with_client(plain_client());
    Orchestrator::new(
        api,
        ModelCatalog::builtin(),
        Arc::new(RateGovernor::new(25, Duration::from_secs(60))),
    )
}

fn completion_body(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

async fn mount_model_response(server: &MockServer, model: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": model })))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn preferred_model_success_takes_one_attempt() {
    let server = MockServer::start().await;
    mount_model_response(
        &server,
        PREFERRED,
        ResponseTemplate::new(200).set_body_json(completion_body("hello")),
    )
    .await;

    let orch = orchestrator(&server);
    let completion = orch
        .complete_with_fallback("say hello", PREFERRED)
        .await
        .unwrap();

    assert_eq!(completion.text, "hello");
    assert_eq!(completion.model, PREFERRED);
    assert_eq!(completion.attempts.len(), 1);
    assert!(completion.attempts[0].success);
    assert_eq!(orch.governor().count(), 1);
}

#[tokio::test]
async fn sweep_falls_back_until_a_model_answers() {
    let server = MockServer::start().await;
    // Preferred and the second model are rate-limited / unavailable; the
    // third answers. Models two through four in builtin catalog order.
    mount_model_response(&server, PREFERRED, ResponseTemplate::new(503)).await;
    mount_model_response(&server, "llama-3.1-8b-instant", ResponseTemplate::new(503)).await;
    mount_model_response(
        &server,
        "mixtral-8x7b-32768",
        ResponseTemplate::new(200).set_body_json(completion_body("from mixtral")),
    )
    .await;

    let orch = orchestrator(&server);
    let completion = orch
        .complete_with_fallback("anything", PREFERRED)
        .await
        .unwrap();

    assert_eq!(completion.text, "from mixtral");
    assert_eq!(completion.model, "mixtral-8x7b-32768");
    assert_eq!(completion.attempts.len(), 3);
    assert!(!completion.attempts[0].success);
    assert!(!completion.attempts[1].success);
    assert!(completion.attempts[2].success);
    // Every attempt was counted against the rate window.
    assert_eq!(orch.governor().count(), 3);
}

#[tokio::test]
async fn exhausted_chain_reports_all_models_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "internal error", "type": "server_error" }
        })))
        .mount(&server)
        .await;

    let orch = orchestrator(&server);
    let err = orch
        .complete_with_fallback("anything", PREFERRED)
        .await
        .unwrap_err();

    let catalog_len = orch.catalog().models().len();
    assert_eq!(err.attempts.len(), catalog_len);
    assert!(err.attempts.iter().all(|a| !a.success));
    assert!(err.last.to_string().contains("internal error"));
    assert_eq!(orch.governor().count(), catalog_len as u32);
}

#[tokio::test]
async fn auth_failures_fall_back_like_transient_errors() {
    let server = MockServer::start().await;
    mount_model_response(
        &server,
        PREFERRED,
        ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "invalid api key" }
        })),
    )
    .await;
    mount_model_response(
        &server,
        "llama-3.1-8b-instant",
        ResponseTemplate::new(200).set_body_json(completion_body("still works")),
    )
    .await;

    let orch = orchestrator(&server);
    let completion = orch
        .complete_with_fallback("anything", PREFERRED)
        .await
        .unwrap();

    assert_eq!(completion.text, "still works");
    assert_eq!(
        completion.attempts[0].error.as_deref(),
        Some("model llama-3.3-70b-versatile: HTTP 401: invalid api key")
    );
}

#[tokio::test]
async fn request_carries_bearer_auth_and_chat_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": PREFERRED,
            "messages": [{ "role": "user", "content": "ping" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("pong")))
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(&server);
    let completion = orch.complete_with_fallback("ping", PREFERRED).await.unwrap();
    assert_eq!(completion.text, "pong");
}

#[tokio::test]
async fn default_client_refuses_plain_http() {
    let server = MockServer::start().await;
    mount_model_response(
        &server,
        PREFERRED,
        ResponseTemplate::new(200).set_body_json(completion_body("leaked")),
    )
    .await;

    // No with_client override: the shared https-only client is in effect,
    // so the bearer token never reaches the plain-http server.
    let api = CompletionApi::new(server.uri(), "test-key", Duration::from_secs(5));
    let orch = Orchestrator::new(
        api,
        ModelCatalog::builtin(),
        Arc::new(RateGovernor::new(25, Duration::from_secs(60))),
    );

    let err = orch
        .complete_with_fallback("anything", PREFERRED)
        .await
        .unwrap_err();
    assert!(err.attempts.iter().all(|a| !a.success));
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn preferred_model_timeout_falls_back() {
    let server = MockServer::start().await;
    mount_model_response(
        &server,
        PREFERRED,
        ResponseTemplate::new(200)
            .set_body_json(completion_body("too late"))
            .set_delay(Duration::from_secs(2)),
    )
    .await;
    mount_model_response(
        &server,
        "llama-3.1-8b-instant",
        ResponseTemplate::new(200).set_body_json(completion_body("in time")),
    )
    .await;

    let orch = orchestrator_with_timeout(&server, Duration::from_millis(100));
    let completion = orch
        .complete_with_fallback("anything", PREFERRED)
        .await
        .unwrap();

    assert_eq!(completion.text, "in time");
    assert_eq!(completion.model, "llama-3.1-8b-instant");
    assert_eq!(completion.attempts.len(), 2);
    assert!(!completion.attempts[0].success);
    assert!(
        completion.attempts[0]
            .error
            .as_deref()
            .unwrap()
            .contains("request failed")
    );
}

#[tokio::test]
async fn empty_choices_is_a_failure_that_falls_back() {
    let server = MockServer::start().await;
    mount_model_response(
        &server,
        PREFERRED,
        ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })),
    )
    .await;
    mount_model_response(
        &server,
        "llama-3.1-8b-instant",
        ResponseTemplate::new(200).set_body_json(completion_body("recovered")),
    )
    .await;

    let orch = orchestrator(&server);
    let completion = orch
        .complete_with_fallback("anything", PREFERRED)
        .await
        .unwrap();
    assert_eq!(completion.text, "recovered");
    assert_eq!(completion.attempts.len(), 2);
}
