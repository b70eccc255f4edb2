mod common;

use scout_http::HttpClient;
use scout_llm::{
    AnalysisClient, Analyzer, LlmError, Provider, ProviderAdapter, ProviderOverride, NO_RESPONSE,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, provider: Provider, prefix: &str) -> AnalysisClient {
    let adapter = ProviderAdapter::default().with_override(
        provider,
        ProviderOverride {
            model: None,
            base_url: Some(format!("{}{}", server.uri(), prefix)),
        },
    );
    AnalysisClient::new(HttpClient::new().unwrap(), adapter)
}

fn domains() -> Vec<String> {
    vec!["alpha.com".to_string(), "beta.io".to_string()]
}

#[tokio::test]
async fn openai_analysis_round_trip() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-3.5-turbo", "max_tokens": 1000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "1. alpha.com"}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Provider::OpenAi, "/v1");
    let out = client
        .analyze(Provider::OpenAi, "sk-test", &domains(), "Rank")
        .await
        .unwrap();
    assert_eq!(out.text, "1. alpha.com");
    assert_eq!(out.model, "gpt-3.5-turbo");
    assert_eq!(out.usage.unwrap()["total_tokens"], 25);
}

#[tokio::test]
async fn gemini_key_travels_in_query() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(query_param("key", "g-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "gemini says"}]}}],
            "usageMetadata": {"totalTokenCount": 9}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Provider::Gemini, "/v1beta");
    let out = client
        .analyze(Provider::Gemini, "g-test", &domains(), "Rank")
        .await
        .unwrap();
    assert_eq!(out.text, "gemini says");
    assert_eq!(out.usage, Some(json!({"totalTokenCount": 9})));
}

#[tokio::test]
async fn malformed_success_body_yields_sentinel() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, Provider::Cohere, "/v1");
    let out = client
        .analyze(Provider::Cohere, "c-test", &domains(), "Rank")
        .await
        .unwrap();
    assert_eq!(out.text, NO_RESPONSE);
    assert!(out.usage.is_none());
}

#[tokio::test]
async fn upstream_error_message_is_surfaced_once() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Provider::Claude, "/v1");
    let err = client
        .analyze(Provider::Claude, "bad", &domains(), "Rank")
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Http(_)));
    assert_eq!(
        err.describe(Provider::Claude),
        "claude API error: invalid x-api-key"
    );
}

#[tokio::test]
async fn claude_probe_is_a_one_token_chat() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "a-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"max_tokens": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Provider::Claude, "/v1");
    let outcome = client.probe(Provider::Claude, "a-test").await.unwrap();
    assert_eq!(outcome.status, 200);
}

#[tokio::test]
async fn list_probe_failure_uses_status_text() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Provider::Mistral, "/v1");
    let err = client.probe(Provider::Mistral, "m").await.unwrap_err();
    assert_eq!(err.describe(Provider::Mistral), "mistral API error: Forbidden");
}
