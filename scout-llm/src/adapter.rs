//! Provider-specific request building and response parsing.
//!
//! Everything here is pure: requests come back as [`PreparedRequest`]s that
//! can be inspected before anything touches the network.

use std::borrow::Cow;
use std::collections::HashMap;

use reqwest::header::HeaderName;
use reqwest::Method;
use scout_http::{Auth, PreparedRequest};
use serde::Serialize;
use serde_json::Value;

use crate::provider::{BodyShape, CredentialTransport, Provider};
use crate::traits::LlmError;

pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const NO_RESPONSE: &str = "No response";

const PROBE_MESSAGE: &str = "hello";

/// Per-provider overrides layered over the static descriptor.
#[derive(Debug, Clone, Default)]
pub struct ProviderOverride {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderAdapter {
    overrides: HashMap<Provider, ProviderOverride>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for ProviderAdapter {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Cow<'a, str>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: u32,
    temperature: f64,
}

impl ProviderAdapter {
    pub fn new(max_tokens: u32, temperature: f64) -> Self {
        Self {
            max_tokens,
            temperature,
            ..Self::default()
        }
    }

    pub fn with_override(mut self, provider: Provider, over: ProviderOverride) -> Self {
        self.overrides.insert(provider, over);
        self
    }

    pub fn model(&self, provider: Provider) -> &str {
        self.overrides
            .get(&provider)
            .and_then(|o| o.model.as_deref())
            .unwrap_or(provider.descriptor().default_model)
    }

    pub fn base_url(&self, provider: Provider) -> &str {
        self.overrides
            .get(&provider)
            .and_then(|o| o.base_url.as_deref())
            .unwrap_or(provider.descriptor().base_url)
            .trim_end_matches('/')
    }

    fn url(&self, provider: Provider, endpoint: &str) -> String {
        let endpoint = endpoint.replace("{model}", self.model(provider));
        format!("{}{}", self.base_url(provider), endpoint)
    }

    /// Build the outbound analysis call for `provider`.
    ///
    /// ```
    /// use scout_llm::{Provider, ProviderAdapter};
    ///
    /// let req = ProviderAdapter::default()
    ///     .build_request(Provider::Cohere, "co-key", &["example.com".into()], "Rank these")
    ///     .unwrap();
    /// let body = req.body.unwrap();
    /// assert_eq!(body["prompt"], "Rank these\n\nList of domains to analyze: example.com");
    /// assert!(body.get("messages").is_none());
    /// ```
    pub fn build_request(
        &self,
        provider: Provider,
        credential: &str,
        domains: &[String],
        prompt: &str,
    ) -> Result<PreparedRequest, LlmError> {
        let desc = provider.descriptor();
        let body = self.body(provider, domains, prompt)?;
        let req = PreparedRequest::new(Method::POST, &self.url(provider, desc.chat_endpoint))?
            .with_json(body);
        self.authorize(provider, credential, req)
    }

    /// Build the cheapest call that proves the credential works.
    pub fn build_probe_request(
        &self,
        provider: Provider,
        credential: &str,
    ) -> Result<PreparedRequest, LlmError> {
        let desc = provider.descriptor();
        let req = match desc.body {
            BodyShape::ClaudeMessages => {
                let body = ChatRequest {
                    model: self.model(provider),
                    messages: vec![ChatMessage {
                        role: "user",
                        content: Cow::Borrowed(PROBE_MESSAGE),
                    }],
                    max_tokens: 1,
                    temperature: None,
                };
                PreparedRequest::new(Method::POST, &self.url(provider, desc.probe_endpoint))?
                    .with_json(to_value(&body)?)
            }
            _ => PreparedRequest::new(Method::GET, &self.url(provider, desc.probe_endpoint))?,
        };
        self.authorize(provider, credential, req)
    }

    fn authorize(
        &self,
        provider: Provider,
        credential: &str,
        mut req: PreparedRequest,
    ) -> Result<PreparedRequest, LlmError> {
        let desc = provider.descriptor();
        for (name, value) in desc.extra_headers {
            req = req.with_header(name, value)?;
        }
        let auth = match desc.credential {
            CredentialTransport::Bearer => Auth::Bearer(credential),
            CredentialTransport::Header(name) => Auth::Header {
                name: HeaderName::from_static(name),
                value: credential,
            },
            CredentialTransport::Query(name) => Auth::Query {
                name,
                value: Cow::Borrowed(credential),
            },
        };
        Ok(req.with_auth(auth)?)
    }

    fn body(&self, provider: Provider, domains: &[String], prompt: &str) -> Result<Value, LlmError> {
        let list = domains.join(", ");
        let combined = format!("{prompt}\n\nList of domains to analyze: {list}");
        let model = self.model(provider);

        match provider.descriptor().body {
            BodyShape::ChatMessages => to_value(&ChatRequest {
                model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: Cow::Borrowed(prompt),
                    },
                    ChatMessage {
                        role: "user",
                        content: Cow::Owned(format!("Here is a list of domains to analyze: {list}")),
                    },
                ],
                max_tokens: self.max_tokens,
                temperature: Some(self.temperature),
            }),
            BodyShape::ClaudeMessages => to_value(&ChatRequest {
                model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: Cow::Owned(combined),
                }],
                max_tokens: self.max_tokens,
                temperature: None,
            }),
            BodyShape::GeminiContents => to_value(&GeminiRequest {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart { text: combined }],
                }],
                generation_config: GeminiGenerationConfig {
                    max_output_tokens: self.max_tokens,
                    temperature: self.temperature,
                },
            }),
            BodyShape::CoherePrompt => to_value(&CohereRequest {
                model,
                prompt: combined,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            }),
        }
    }
}

fn to_value<T: Serialize>(body: &T) -> Result<Value, LlmError> {
    serde_json::to_value(body).map_err(|e| LlmError::Build(e.to_string()))
}

fn response_pointer(provider: Provider) -> &'static str {
    match provider.descriptor().body {
        BodyShape::ChatMessages => "/choices/0/message/content",
        BodyShape::GeminiContents => "/candidates/0/content/parts/0/text",
        BodyShape::ClaudeMessages => "/content/0/text",
        BodyShape::CoherePrompt => "/generations/0/text",
    }
}

/// Pull the reply text out of a raw provider body.
///
/// Never fails: missing fields, non-JSON bodies and empty strings all yield
/// [`NO_RESPONSE`].
pub fn parse_response(provider: Provider, raw: &[u8]) -> String {
    serde_json::from_slice::<Value>(raw)
        .ok()
        .as_ref()
        .and_then(|v| v.pointer(response_pointer(provider)))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NO_RESPONSE.to_string())
}

/// Opaque usage metadata: top-level `usage`, or Gemini's `usageMetadata`.
pub fn parse_usage(raw: &[u8]) -> Option<Value> {
    let v: Value = serde_json::from_slice(raw).ok()?;
    v.get("usage")
        .or_else(|| v.get("usageMetadata"))
        .filter(|u| !u.is_null())
        .cloned()
}
