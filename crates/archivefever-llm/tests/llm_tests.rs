//! Tests for the Anthropic provider against a mock Messages endpoint

use archivefever_llm::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> AnthropicProvider {
    AnthropicProvider::new("test-key").with_base_url(format!("{}/v1/messages", server.uri()))
}

fn request() -> LlmRequest {
    LlmRequest::new("claude-sonnet-4-20250514", 2000)
        .with_system("You are a stream of thought.")
        .user("Think about the archive.")
}

// ===========================================================================
// Success
// ===========================================================================

#[tokio::test]
async fn complete_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "The archive "},
                {"type": "thinking", "thinking": "ignored"},
                {"type": "text", "text": "remembers."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = provider(&server).complete(request()).await.unwrap();
    assert_eq!(text, "The archive remembers.");
}

#[tokio::test]
async fn request_body_carries_system_and_max_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "ok"}]
        })))
        .mount(&server)
        .await;

    provider(&server).complete(request()).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "claude-sonnet-4-20250514");
    assert_eq!(body["max_tokens"], 2000);
    assert_eq!(body["system"], "You are a stream of thought.");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Think about the archive.");
    assert!(body.get("temperature").is_none());
}

// ===========================================================================
// Failures
// ===========================================================================

#[tokio::test]
async fn unauthorized_maps_to_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(request()).await.unwrap_err();
    assert!(matches!(err, LlmError::AuthFailed(ref m) if m == "bad key"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn too_many_requests_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = provider(&server).complete(request()).await.unwrap_err();
    assert!(matches!(err, LlmError::RateLimited { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn server_error_maps_to_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(request()).await.unwrap_err();
    assert!(matches!(err, LlmError::RequestFailed(ref m) if m.contains("overloaded")));
}

#[tokio::test]
async fn empty_content_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .mount(&server)
        .await;

    let err = provider(&server).complete(request()).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse(_)));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"content": [{"type": "text", "text": "late"}]}))
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = provider(&server)
        .with_timeout(std::time::Duration::from_millis(50))
        .complete(request())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Timeout(50)));
}

#[test]
fn llm_error_converts_into_core_error() {
    let err: archivefever_core::Error = LlmError::AuthFailed("nope".into()).into();
    assert!(err.to_string().contains("authentication failed"));
}
