//! Integration tests for the three engine clients.
//!
//! Each test stands up a `wiremock` server so no real provider is contacted.
//! Covers request shape, answer/citation extraction, and the status-code
//! classification every client shares.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use geobench_core::{EngineKind, EngineSettings};
use geobench_engines::{build_client, ClaudeClient, EngineClient, EngineError, GrokClient, OpenAiClient};

fn responses_body(text: &str, url: &str) -> serde_json::Value {
    json!({
        "id": "resp_1",
        "model": "grok-4-0709",
        "output": [
            {"type": "web_search_call", "status": "completed"},
            {"type": "message", "content": [
                {"type": "output_text", "text": text, "annotations": [
                    {"type": "url_citation", "url": url, "title": "Source"}
                ]}
            ]}
        ],
        "usage": {"input_tokens": 12, "output_tokens": 40}
    })
}

// ---------------------------------------------------------------------------
// Grok
// ---------------------------------------------------------------------------

#[tokio::test]
async fn grok_sends_web_search_tool_and_parses_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(header("authorization", "Bearer xai-test"))
        .and(body_partial_json(json!({
            "model": "grok-4-0709",
            "tools": [{"type": "web_search"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(responses_body("ON24 is the top pick.", "https://on24.com")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GrokClient::with_base_url("xai-test", "grok-4-0709", 5, &server.uri())
        .expect("client builds");
    let answer = client.call("Best webinar platform?").await.expect("call ok");

    assert_eq!(answer.text, "ON24 is the top pick.");
    assert_eq!(answer.model, "grok-4-0709");
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].url, "https://on24.com");
    assert_eq!(answer.usage["input_tokens"], 12);
}

#[tokio::test]
async fn grok_without_output_text_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": []})))
        .mount(&server)
        .await;

    let client = GrokClient::with_base_url("xai-test", "grok-4-0709", 5, &server.uri()).unwrap();
    let err = client.call("q").await.unwrap_err();
    assert!(matches!(err, EngineError::Malformed(_)), "got: {err:?}");
}

#[tokio::test]
async fn status_codes_are_classified() {
    let cases = [
        (401, "auth"),
        (403, "auth"),
        (429, "rate_limit"),
        (503, "server_error"),
        (400, "malformed"),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let client =
            GrokClient::with_base_url("xai-test", "grok-4-0709", 5, &server.uri()).unwrap();
        let err = client.call("q").await.unwrap_err();
        assert_eq!(err.class().as_str(), expected, "HTTP {status} → {err:?}");
    }
}

#[tokio::test]
async fn invalid_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = ClaudeClient::with_base_url("sk-ant", "claude-sonnet-4-5-20250929", 5, &server.uri())
        .unwrap();
    let err = client.call("q").await.unwrap_err();
    assert!(matches!(err, EngineError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_server_is_connection_error() {
    // Port 9 (discard) on localhost is not listening in the test environment.
    let client = GrokClient::with_base_url("xai-test", "grok-4-0709", 2, "http://127.0.0.1:9").unwrap();
    let err = client.call("q").await.unwrap_err();
    assert!(matches!(err, EngineError::Connection(_)), "got: {err:?}");
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openai_uses_web_search_preview_tool() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({"tools": [{"type": "web_search_preview"}]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(responses_body("Goldcast is strong.", "https://goldcast.io")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("sk-test", "gpt-4o", 5, &server.uri()).unwrap();
    let answer = client.call("q").await.unwrap();
    assert_eq!(answer.text, "Goldcast is strong.");
    assert_eq!(answer.citations[0].url, "https://goldcast.io");
}

#[tokio::test]
async fn openai_falls_back_to_chat_completions_when_search_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(400).set_body_string("tool not supported"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 2048})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "ON24 and Goldcast."}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("sk-test", "gpt-4o", 5, &server.uri()).unwrap();
    let answer = client.call("q").await.unwrap();

    assert_eq!(answer.text, "ON24 and Goldcast.");
    assert_eq!(answer.model, "gpt-4o-2024-08-06");
    assert!(answer.citations.is_empty());
    assert_eq!(answer.usage["input_tokens"], 20);
    assert_eq!(answer.usage["output_tokens"], 5);
}

#[tokio::test]
async fn openai_auth_failure_does_not_fall_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("sk-test", "gpt-4o", 5, &server.uri()).unwrap();
    let err = client.call("q").await.unwrap_err();
    assert!(err.is_auth());
}

// ---------------------------------------------------------------------------
// Claude
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claude_sends_anthropic_headers_and_joins_text_blocks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-sonnet-4-5-20250929",
            "max_tokens": 2048
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-sonnet-4-5-20250929",
            "content": [
                {"type": "text", "text": "ON24 suits enterprises. "},
                {"type": "text", "text": "Zoom Webinars is simpler."}
            ],
            "usage": {"input_tokens": 30, "output_tokens": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        ClaudeClient::with_base_url("sk-ant", "claude-sonnet-4-5-20250929", 5, &server.uri())
            .unwrap();
    let answer = client.call("q").await.unwrap();

    assert_eq!(answer.text, "ON24 suits enterprises. Zoom Webinars is simpler.");
    assert!(answer.citations.is_empty());
    assert_eq!(answer.usage["output_tokens"], 12);
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

#[test]
fn build_client_requires_api_key() {
    let settings = EngineSettings {
        kind: EngineKind::ClaudeParametric,
        api_key: None,
        model: "claude-sonnet-4-5-20250929".to_string(),
        base_url: "https://api.anthropic.com".to_string(),
        min_interval_ms: 1_500,
    };
    assert!(matches!(
        build_client(&settings, 30),
        Err(EngineError::Config(_))
    ));
}

#[test]
fn build_client_returns_matching_kind() {
    for kind in EngineKind::ALL {
        let settings = EngineSettings {
            kind,
            api_key: Some("key".to_string()),
            model: "m".to_string(),
            base_url: "http://localhost".to_string(),
            min_interval_ms: 0,
        };
        let client = build_client(&settings, 30).unwrap();
        assert_eq!(client.kind(), kind);
        assert_eq!(client.model(), "m");
    }
}
