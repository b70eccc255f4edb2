//! Request/response dispatch between the page side, the provider side and
//! the front end.
//!
//! Requests arrive as `{type, ...payload}` JSON envelopes (camelCase, the same
//! shapes the browser extension used). Every request produces exactly one
//! [`Response`]; failures become `{success: false, message}` and never escape.

use std::sync::Arc;

use anyhow::anyhow;
use scout_llm::{Analyzer, LlmError, Provider};
use scout_web::{apply_filters, FilterSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::actor::{Actor, Addr, Context};
use crate::capture::{Capture, CaptureController};
use crate::store::{AnalysisRecord, HistoryEntry, Preferences, ScoutStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    CaptureDomainsManually,
    GetCurrentPageDomains,
    ToggleAutoCapture {
        enabled: bool,
    },
    TestApiConnection {
        provider: String,
    },
    #[serde(rename = "sendDomainsToAI")]
    SendDomainsToAi {
        provider: String,
        domains: Vec<String>,
        prompt: String,
    },
    SaveFilterSettings {
        settings: FilterSettings,
    },
    GetFilterSettings,
    SaveApiKey {
        provider: String,
        api_key: String,
    },
    GetApiKey {
        provider: String,
    },
    SaveCustomPrompt {
        prompt: String,
    },
    GetCustomPrompt,
    SaveToHistory {
        entry: HistoryEntry,
    },
    GetHistory,
    ClearHistory,
    ApplyFilters {
        domains: Vec<String>,
    },
    GetPreferences,
    SavePreferences {
        preferences: Preferences,
    },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::CaptureDomainsManually => "captureDomainsManually",
            Request::GetCurrentPageDomains => "getCurrentPageDomains",
            Request::ToggleAutoCapture { .. } => "toggleAutoCapture",
            Request::TestApiConnection { .. } => "testApiConnection",
            Request::SendDomainsToAi { .. } => "sendDomainsToAI",
            Request::SaveFilterSettings { .. } => "saveFilterSettings",
            Request::GetFilterSettings => "getFilterSettings",
            Request::SaveApiKey { .. } => "saveApiKey",
            Request::GetApiKey { .. } => "getApiKey",
            Request::SaveCustomPrompt { .. } => "saveCustomPrompt",
            Request::GetCustomPrompt => "getCustomPrompt",
            Request::SaveToHistory { .. } => "saveToHistory",
            Request::GetHistory => "getHistory",
            Request::ClearHistory => "clearHistory",
            Request::ApplyFilters { .. } => "applyFilters",
            Request::GetPreferences => "getPreferences",
            Request::SavePreferences { .. } => "savePreferences",
        }
    }
}

/// Success payloads; flattened next to `success`/`message`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ResponseBody {
    Domains {
        domains: Vec<String>,
        count: usize,
        url: Option<String>,
    },
    Filtered {
        domains: Vec<String>,
        count: usize,
    },
    Probe {
        status: u16,
    },
    Analysis {
        data: String,
        usage: Option<Value>,
    },
    Settings {
        settings: FilterSettings,
    },
    ApiKey {
        api_key: Option<String>,
    },
    Prompt {
        prompt: String,
    },
    Entry {
        entry: AnalysisRecord,
    },
    History {
        history: Vec<AnalysisRecord>,
    },
    Preferences {
        preferences: Preferences,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub body: Option<ResponseBody>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            body: None,
        }
    }

    pub fn with_body(body: ResponseBody) -> Self {
        Self {
            body: Some(body),
            ..Self::ok()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            body: None,
        }
    }
}

impl From<Capture> for ResponseBody {
    fn from(c: Capture) -> Self {
        ResponseBody::Domains {
            domains: c.domains,
            count: c.count,
            url: c.url,
        }
    }
}

/// Stateless dispatch table from request type to handler.
#[derive(Clone)]
pub struct Router {
    store: ScoutStore,
    capture: Arc<CaptureController>,
    analyzer: Arc<dyn Analyzer>,
}

fn parse_provider(raw: &str) -> Result<Provider, String> {
    raw.parse::<Provider>().map_err(|e| e.to_string())
}

fn store_err(e: impl std::fmt::Display) -> String {
    e.to_string()
}

impl Router {
    pub fn new(store: ScoutStore, capture: Arc<CaptureController>, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            store,
            capture,
            analyzer,
        }
    }

    /// Decode a raw envelope and dispatch it.
    ///
    /// Unknown types and malformed payloads are answered immediately with
    /// `success: false`.
    pub async fn dispatch_value(&self, raw: Value) -> Response {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
            .to_string();
        match serde_json::from_value::<Request>(raw) {
            Ok(req) => self.dispatch(req).await,
            Err(err) if err.to_string().starts_with("unknown variant") || kind == "<missing>" => {
                tracing::warn!(kind = %kind, "router.unrecognized");
                Response::failure(format!("Unrecognized message type: {kind}"))
            }
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "router.malformed");
                Response::failure(format!("Malformed {kind} request: {err}"))
            }
        }
    }

    pub async fn dispatch(&self, req: Request) -> Response {
        let kind = req.kind();
        let resp = match self.handle(req).await {
            Ok(resp) => resp,
            Err(message) => Response::failure(message),
        };
        tracing::info!(kind, success = resp.success, "router.dispatch");
        resp
    }

    async fn handle(&self, req: Request) -> Result<Response, String> {
        match req {
            Request::CaptureDomainsManually | Request::GetCurrentPageDomains => {
                let capture = self.capture.capture().await.map_err(|e| e.to_string())?;
                Ok(Response::with_body(capture.into()))
            }
            Request::ToggleAutoCapture { enabled } => {
                self.capture.set_auto_capture(enabled).await;
                self.store.set_auto_capture(enabled).await.map_err(store_err)?;
                let state = if enabled { "enabled" } else { "disabled" };
                Ok(Response::ok().with_message(format!("Auto-capture {state}")))
            }
            Request::TestApiConnection { provider } => {
                let provider = parse_provider(&provider)?;
                let credential = self.credential(provider).await?;
                let outcome = self
                    .analyzer
                    .probe(provider, &credential)
                    .await
                    .map_err(|e| e.describe(provider))?;
                Ok(Response::with_body(ResponseBody::Probe {
                    status: outcome.status,
                })
                .with_message(format!("{provider} connection successful")))
            }
            Request::SendDomainsToAi {
                provider,
                domains,
                prompt,
            } => {
                let provider = parse_provider(&provider)?;
                let credential = self.credential(provider).await?;
                let analysis = self
                    .analyzer
                    .analyze(provider, &credential, &domains, &prompt)
                    .await
                    .map_err(|e| e.describe(provider))?;
                Ok(Response::with_body(ResponseBody::Analysis {
                    data: analysis.text,
                    usage: analysis.usage,
                }))
            }
            Request::SaveFilterSettings { settings } => {
                self.store
                    .set_filter_settings(&settings)
                    .await
                    .map_err(store_err)?;
                Ok(Response::ok())
            }
            Request::GetFilterSettings => {
                let settings = self.store.filter_settings().await.map_err(store_err)?;
                Ok(Response::with_body(ResponseBody::Settings { settings }))
            }
            Request::SaveApiKey { provider, api_key } => {
                let provider = parse_provider(&provider)?;
                self.store
                    .set_credential(provider, &api_key)
                    .await
                    .map_err(store_err)?;
                Ok(Response::ok())
            }
            Request::GetApiKey { provider } => {
                let provider = parse_provider(&provider)?;
                let api_key = self.store.credential(provider).await.map_err(store_err)?;
                Ok(Response::with_body(ResponseBody::ApiKey { api_key }))
            }
            Request::SaveCustomPrompt { prompt } => {
                self.store
                    .set_custom_prompt(&prompt)
                    .await
                    .map_err(store_err)?;
                Ok(Response::ok())
            }
            Request::GetCustomPrompt => {
                let prompt = self.store.custom_prompt().await.map_err(store_err)?;
                Ok(Response::with_body(ResponseBody::Prompt { prompt }))
            }
            Request::SaveToHistory { entry } => {
                let entry = self.store.push_history(entry).await.map_err(store_err)?;
                Ok(Response::with_body(ResponseBody::Entry { entry }))
            }
            Request::GetHistory => {
                let history = self.store.history().await.map_err(store_err)?;
                Ok(Response::with_body(ResponseBody::History { history }))
            }
            Request::ClearHistory => {
                self.store.clear_history().await.map_err(store_err)?;
                Ok(Response::ok())
            }
            Request::ApplyFilters { domains } => {
                let settings = self.store.filter_settings().await.map_err(store_err)?;
                let domains = apply_filters(&domains, &settings);
                Ok(Response::with_body(ResponseBody::Filtered {
                    count: domains.len(),
                    domains,
                }))
            }
            Request::GetPreferences => {
                let preferences = self.store.preferences().await.map_err(store_err)?;
                Ok(Response::with_body(ResponseBody::Preferences { preferences }))
            }
            Request::SavePreferences { preferences } => {
                self.store
                    .set_preferences(&preferences)
                    .await
                    .map_err(store_err)?;
                Ok(Response::ok())
            }
        }
    }

    async fn credential(&self, provider: Provider) -> Result<String, String> {
        self.store
            .credential(provider)
            .await
            .map_err(store_err)?
            .ok_or_else(|| LlmError::MissingCredential(provider).to_string())
    }
}

// ==============================
// Actor host
// ==============================

/// One request envelope and the slot for its single reply.
pub struct RouterMsg {
    pub request: Value,
    pub reply: oneshot::Sender<Response>,
}

pub struct RouterActor {
    router: Router,
}

impl RouterActor {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait::async_trait]
impl Actor for RouterActor {
    type Msg = RouterMsg;
    const NAME: &'static str = "router";

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> anyhow::Result<()> {
        let router = self.router.clone();
        // Provider calls can be slow; keep the mailbox moving.
        tokio::spawn(async move {
            let resp = router.dispatch_value(msg.request).await;
            if msg.reply.send(resp).is_err() {
                tracing::debug!("router.reply_dropped");
            }
        });
        Ok(())
    }
}

/// Send `request` to the router actor and wait for its reply.
pub async fn ask(addr: &Addr<RouterActor>, request: Value) -> anyhow::Result<Response> {
    addr.call(|reply| RouterMsg { request, reply })
        .await
        .map_err(|e| anyhow!("router: {e}"))
}
