mod common;

use std::sync::Arc;
use std::time::Duration;

use scout_actors::actor::{spawn_actor, ActorHandle};
use scout_actors::{ask, CaptureController, Request, ResponseBody, Router, RouterActor, ScoutStore};
use scout_http::HttpClient;
use scout_llm::{AnalysisClient, Provider, ProviderAdapter, ProviderOverride};
use scout_web::{AutoDetected, Extractor, StaticPage};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"
<html><body>
  <a href="https://Sub.Example.COM/path?x=1">Example.com</a>
  <table><tr><td>casino-deals.net</td><td>shop1.com</td></tr></table>
  <ul><li>alpha.com</li><li>beta.io</li></ul>
</body></html>
"#;

struct Harness {
    router: Router,
    store: ScoutStore,
    page: Arc<StaticPage>,
    events: mpsc::Receiver<AutoDetected>,
}

fn harness(server: Option<&MockServer>) -> Harness {
    common::init_test_tracing();
    let url = Url::parse("https://listing.example.org/").unwrap();
    let page = Arc::new(StaticPage::new(Some(url), PAGE));
    let (tx, events) = mpsc::channel(8);
    let capture = Arc::new(CaptureController::new(
        page.clone(),
        Extractor::default(),
        Duration::from_millis(1000),
        tx,
    ));

    let mut adapter = ProviderAdapter::default();
    if let Some(server) = server {
        for p in Provider::ALL {
            adapter = adapter.with_override(
                p,
                ProviderOverride {
                    model: None,
                    base_url: Some(format!("{}/v1", server.uri())),
                },
            );
        }
    }
    let analyzer = Arc::new(AnalysisClient::new(HttpClient::new().unwrap(), adapter));
    let store = ScoutStore::in_memory();
    Harness {
        router: Router::new(store.clone(), capture, analyzer),
        store,
        page,
        events,
    }
}

async fn call(router: &Router, req: Value) -> Value {
    serde_json::to_value(router.dispatch_value(req).await).unwrap()
}

#[tokio::test]
async fn manual_capture_returns_sorted_clean_domains() {
    let h = harness(None);
    let resp = call(&h.router, json!({"type": "captureDomainsManually"})).await;
    assert_eq!(resp["success"], true);
    assert_eq!(
        resp["domains"],
        json!(["alpha.com", "beta.io", "casino-deals.net", "shop1.com", "sub.example.com"])
    );
    assert_eq!(resp["count"], 5);
    assert_eq!(resp["url"], "https://listing.example.org/");
    assert!(resp.get("message").is_none());
}

#[tokio::test]
async fn unknown_and_malformed_requests_fail_fast() {
    let h = harness(None);
    let resp = call(&h.router, json!({"type": "reticulateSplines"})).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["message"], "Unrecognized message type: reticulateSplines");

    let resp = call(&h.router, json!({"noType": true})).await;
    assert_eq!(resp["success"], false);

    let resp = call(&h.router, json!({"type": "toggleAutoCapture", "enabled": "yes"})).await;
    assert_eq!(resp["success"], false);
    assert!(resp["message"].as_str().unwrap().starts_with("Malformed toggleAutoCapture"));
}

#[tokio::test]
async fn settings_round_trip_and_filtering() {
    let h = harness(None);
    let resp = call(&h.router, json!({"type": "getFilterSettings"})).await;
    assert_eq!(resp["settings"]["maxLength"], 50);

    let saved = call(
        &h.router,
        json!({"type": "saveFilterSettings", "settings": {"excludeDigits": true, "excludeKeywords": ["casino"]}}),
    )
    .await;
    assert_eq!(saved, json!({"success": true}));

    let resp = call(
        &h.router,
        json!({"type": "applyFilters", "domains": ["alpha.com", "casino-deals.net", "shop1.com", "alpha.com"]}),
    )
    .await;
    assert_eq!(resp["domains"], json!(["alpha.com"]));
    assert_eq!(resp["count"], 1);
}

#[tokio::test]
async fn api_keys_prompts_and_preferences() {
    let h = harness(None);
    let resp = call(&h.router, json!({"type": "getApiKey", "provider": "openai"})).await;
    assert_eq!(resp, json!({"success": true, "apiKey": null}));

    call(&h.router, json!({"type": "saveApiKey", "provider": "openai", "apiKey": "sk-1"})).await;
    let resp = call(&h.router, json!({"type": "getApiKey", "provider": "openai"})).await;
    assert_eq!(resp["apiKey"], "sk-1");

    let resp = call(&h.router, json!({"type": "saveApiKey", "provider": "bard", "apiKey": "x"})).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["message"], "unsupported provider: bard");

    let resp = call(&h.router, json!({"type": "getCustomPrompt"})).await;
    assert_eq!(resp["prompt"], scout_llm::DEFAULT_PROMPT);
    call(&h.router, json!({"type": "saveCustomPrompt", "prompt": "Rank by brandability"})).await;
    let resp = call(&h.router, json!({"type": "getCustomPrompt"})).await;
    assert_eq!(resp["prompt"], "Rank by brandability");

    call(
        &h.router,
        json!({"type": "savePreferences", "preferences": {"language": "fr", "currentTab": "history"}}),
    )
    .await;
    let resp = call(&h.router, json!({"type": "getPreferences"})).await;
    assert_eq!(resp["preferences"], json!({"language": "fr", "currentTab": "history"}));
}

#[tokio::test]
async fn analysis_requires_a_stored_key() {
    let h = harness(None);
    let resp = call(
        &h.router,
        json!({"type": "sendDomainsToAI", "provider": "gemini", "domains": ["a.com"], "prompt": "p"}),
    )
    .await;
    assert_eq!(resp, json!({"success": false, "message": "API key not found for gemini"}));
}

#[tokio::test]
async fn analysis_and_history_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "alpha.com is the best lead"}}],
            "usage": {"total_tokens": 42}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(Some(&server));
    h.store.set_credential(Provider::OpenAi, "sk-live").await.unwrap();

    let resp = call(
        &h.router,
        json!({"type": "sendDomainsToAI", "provider": "openai", "domains": ["alpha.com"], "prompt": "Rank"}),
    )
    .await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["data"], "alpha.com is the best lead");
    assert_eq!(resp["usage"]["total_tokens"], 42);

    let saved = call(
        &h.router,
        json!({"type": "saveToHistory", "entry": {
            "provider": "openai", "prompt": "Rank", "domains": ["alpha.com"],
            "result": resp["data"], "usage": resp["usage"]
        }}),
    )
    .await;
    assert_eq!(saved["success"], true);
    let id = saved["entry"]["id"].as_str().unwrap().to_string();

    let history = call(&h.router, json!({"type": "getHistory"})).await;
    assert_eq!(history["history"][0]["id"], id);

    call(&h.router, json!({"type": "clearHistory"})).await;
    let history = call(&h.router, json!({"type": "getHistory"})).await;
    assert_eq!(history["history"], json!([]));
}

#[tokio::test]
async fn probe_failure_carries_upstream_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .mount(&server)
        .await;

    let h = harness(Some(&server));
    h.store.set_credential(Provider::Cohere, "bad").await.unwrap();
    h.store.set_credential(Provider::Claude, "good").await.unwrap();

    let resp = call(&h.router, json!({"type": "testApiConnection", "provider": "cohere"})).await;
    assert_eq!(
        resp,
        json!({"success": false, "message": "cohere API error: Incorrect API key provided"})
    );

    let resp = call(&h.router, json!({"type": "testApiConnection", "provider": "claude"})).await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["status"], 200);
    assert_eq!(resp["message"], "claude connection successful");
}

#[tokio::test(start_paused = true)]
async fn auto_capture_toggle_persists_and_reports_new_domains() {
    let mut h = harness(None);
    let resp = call(&h.router, json!({"type": "toggleAutoCapture", "enabled": true})).await;
    assert_eq!(resp["message"], "Auto-capture enabled");
    assert!(h.store.auto_capture_enabled().await.unwrap());

    let first = h.events.recv().await.unwrap();
    assert_eq!(first.domains.len(), 5);

    h.page
        .update(PAGE.replace("<li>beta.io</li>", "<li>beta.io</li><li>gamma.fr</li>"))
        .await;
    let next = h.events.recv().await.unwrap();
    assert_eq!(next.domains, vec!["gamma.fr"]);
    assert_eq!(next.total_domains.len(), 6);

    let resp = call(&h.router, json!({"type": "toggleAutoCapture", "enabled": false})).await;
    assert_eq!(resp["message"], "Auto-capture disabled");
    assert!(!h.store.auto_capture_enabled().await.unwrap());
}

#[tokio::test]
async fn router_actor_answers_every_envelope() {
    let h = harness(None);
    let ActorHandle { addr, task } = spawn_actor(RouterActor::new(h.router.clone()), 8);

    let mut pending = Vec::new();
    for req in [
        Request::GetFilterSettings,
        Request::GetHistory,
        Request::ApplyFilters {
            domains: vec!["x.com".into()],
        },
    ] {
        let addr = addr.clone();
        let value = serde_json::to_value(&req).unwrap();
        pending.push(tokio::spawn(async move { ask(&addr, value).await }));
    }
    for p in pending {
        assert!(p.await.unwrap().unwrap().success);
    }

    let resp = ask(&addr, json!({"type": "nope"})).await.unwrap();
    assert!(!resp.success);
    assert!(matches!(resp.body, None));

    let resp = ask(&addr, json!({"type": "getCurrentPageDomains"})).await.unwrap();
    assert!(matches!(resp.body, Some(ResponseBody::Domains { count: 5, .. })));

    drop(addr);
    task.await.unwrap().unwrap();
}
