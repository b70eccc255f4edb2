//! Minimal HTTP executor with safe logging and flexible credential transport.
//!
//! - [`PreparedRequest`]: a fully described request (method, URL, headers, JSON body)
//!   that callers can build and inspect without touching the network
//! - [`Auth`]: bearer header, custom header, or query parameter credentials
//! - [`HttpClient::execute`]: one attempt per call; no retries, no backoff
//! - Optional *raw* request/response logging via `SCOUT_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), scout_http::HttpError> {
//! use scout_http::{Auth, HttpClient, PreparedRequest};
//! use reqwest::Method;
//!
//! let req = PreparedRequest::new(Method::GET, "https://api.example.com/v1/models")?
//!     .with_auth(Auth::Bearer("sk-demo"))?;
//! let resp = HttpClient::new()?.execute(&req).await?;
//! let models: serde_json::Value = resp.json()?;
//! # Ok(()) }
//! ```
//!
//! Security: credential values are sanitized before use, and logs only ever
//! include the auth kind (bearer/header/query/none), never the secret.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::borrow::Cow;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SCOUT_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "apikey",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

const SECRET_HEADERS: &[&str] = &["authorization", "x-api-key", "x-goog-api-key"];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_query_key(key: &str) -> bool {
    SECRET_QUERY_KEYS.contains(&key.to_ascii_lowercase().as_str())
}

fn is_secret_header(name: &str) -> bool {
    SECRET_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(req: &PreparedRequest) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", req.method)];
    for (name, val) in redact_headers(&req.headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(body) = &req.body {
        let s = clip(body.to_string(), RAW_MAX_BODY);
        parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", redacted_url(&req.url)));
    parts.join(" ")
}

/// Redact sensitive headers for logging.
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

fn redacted_url(url: &Url) -> String {
    let mut copy = url.clone();
    let pairs = redact_query(url);
    if pairs.is_empty() {
        copy.set_query(None);
    } else {
        copy.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }
    copy.to_string()
}

fn redact_query(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = if is_secret_query_key(&k) {
                "<redacted>".to_string()
            } else {
                v.to_string()
            };
            (k, v)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Auth
// ==============================

/// How a credential travels with a request.
///
/// ```
/// use scout_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// assert_eq!(bearer.kind(), "bearer");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g. `x-api-key`)
    Header { name: HeaderName, value: &'a str },
    /// Credential appended as a query parameter (e.g. `?key=`)
    Query { name: &'a str, value: Cow<'a, str> },
    None,
}

impl Auth<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::Query { .. } => "query",
            Auth::None => "none",
        }
    }
}

// ==============================
// Prepared request
// ==============================

/// A request fully resolved before it is sent.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    auth_kind: &'static str,
}

impl PreparedRequest {
    pub fn new(method: Method, url: &str) -> Result<Self, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            auth_kind: "none",
        })
    }

    /// Attach a static header.
    ///
    /// ```
    /// use scout_http::PreparedRequest;
    /// use reqwest::Method;
    ///
    /// let req = PreparedRequest::new(Method::GET, "https://example.com/")
    ///     .unwrap()
    ///     .with_header("anthropic-version", "2023-06-01")
    ///     .unwrap();
    /// assert_eq!(req.headers["anthropic-version"], "2023-06-01");
    /// ```
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, HttpError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::Build(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::Build(format!("invalid header value for {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set a JSON body (and the matching content type).
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(body);
        self
    }

    /// Apply a credential according to its transport.
    pub fn with_auth(mut self, auth: Auth<'_>) -> Result<Self, HttpError> {
        match &auth {
            Auth::Bearer(tok) => {
                let tok = sanitize_api_key(tok)?;
                let mut value = HeaderValue::from_str(&format!("Bearer {tok}"))
                    .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
                value.set_sensitive(true);
                self.headers.insert(reqwest::header::AUTHORIZATION, value);
            }
            Auth::Header { name, value } => {
                let v = sanitize_api_key(value)?;
                let mut v = HeaderValue::from_str(&v)
                    .map_err(|e| HttpError::Build(format!("invalid {name} header: {e}")))?;
                v.set_sensitive(true);
                self.headers.insert(name.clone(), v);
            }
            Auth::Query { name, value } => {
                let v = sanitize_api_key(value)?;
                self.url.query_pairs_mut().append_pair(name, &v);
            }
            Auth::None => {}
        }
        self.auth_kind = auth.kind();
        Ok(self)
    }

    pub fn auth_kind(&self) -> &'static str {
        self.auth_kind
    }
}

// ==============================
// Response
// ==============================

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HttpError::Decode(e.to_string(), snip_body(&self.body)))
    }
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    pub timeout: Option<Duration>,
}

impl HttpClient {
    /// Construct a client with no request timeout of its own.
    ///
    /// ```no_run
    /// use scout_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new()?;
    /// assert!(client.timeout.is_none());
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .user_agent(format!("domain-scout/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            timeout: None,
        })
    }

    /// Bound every request by `dur`.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    /// Send a prepared request exactly once.
    ///
    /// Non-2xx statuses become [`HttpError::Api`] with the upstream message.
    pub async fn execute(&self, req: &PreparedRequest) -> Result<HttpResponse, HttpError> {
        let mut rb = self
            .inner
            .request(req.method.clone(), req.url.clone())
            .headers(req.headers.clone());
        if let Some(timeout) = self.timeout {
            rb = rb.timeout(timeout);
        }
        if let Some(body) = &req.body {
            let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
            rb = rb.body(bytes);
        }

        let req_id = format!(
            "r{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        tracing::debug!(
            req_id=%req_id,
            method=%req.method,
            host_path=%format!("{}{}", req.url.host_str().unwrap_or("-"), req.url.path()),
            query=?redact_query(&req.url),
            auth_kind=req.auth_kind,
            has_body=%req.body.is_some(),
            "http.request.start"
        );

        if raw_enabled() {
            let curl = make_curl(req);
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let t0 = Instant::now();
        let resp = rb.send().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.send");
            HttpError::Network(message)
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.body");
            HttpError::Network(message)
        })?;
        let body = body.to_vec();
        let dur_ms = t0.elapsed().as_millis() as u64;

        let request_id = headers
            .get("x-request-id")
            .or_else(|| headers.get("request-id"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=body.len(),
            x_request_id=%request_id,
            "http.response.headers"
        );

        if raw_enabled() {
            let mut snip = body.clone();
            let truncated = snip.len() > RAW_MAX_BODY;
            if truncated {
                snip.truncate(RAW_MAX_BODY);
            }
            tracing::info!(
                target: "http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?redact_headers(&headers),
                body=%String::from_utf8_lossy(&snip),
                truncated
            );
        }

        if status.is_success() {
            return Ok(HttpResponse {
                status,
                headers,
                body,
            });
        }

        let message = extract_error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        tracing::warn!(
            req_id=%req_id,
            %status,
            message=%message,
            x_request_id=%request_id,
            body_snippet=%snip_body(&body),
            "http.error"
        );
        Err(HttpError::Api {
            status,
            message,
            request_id,
        })
    }
}

// ==============================
// Helpers
// ==============================

/// `error.message` from a provider error envelope, if present and non-empty.
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        #[serde(default)]
        message: String,
    }

    serde_json::from_slice::<Envelope>(body)
        .ok()
        .map(|env| env.error.message)
        .filter(|m| !m.is_empty())
}

/// Cut `s` to at most `max` bytes on a char boundary, marking the cut with `...`.
fn clip(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

fn snip_body(body: &[u8]) -> String {
    clip(String::from_utf8_lossy(body).into_owned(), 500)
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    // Trim outer spaces/quotes, then drop any embedded whitespace.
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("credential is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("credential contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "credential contains control characters".into(),
        ));
    }
    Ok(s)
}
