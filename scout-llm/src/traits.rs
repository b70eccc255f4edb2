use async_trait::async_trait;
use scout_http::HttpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::Provider;

/// Text extracted from a provider reply, plus any usage metadata it carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub text: String,
    pub model: String,
    pub usage: Option<Value>,
}

/// Outcome of a connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: u16,
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("API key not found for {0}")]
    MissingCredential(Provider),

    #[error("request build failed: {0}")]
    Build(String),

    #[error(transparent)]
    Http(#[from] HttpError),
}

impl LlmError {
    /// Short message for response envelopes.
    ///
    /// Upstream errors carry only the provider's own message (or the status
    /// text); network errors are reported verbatim.
    pub fn describe(&self, provider: Provider) -> String {
        match self {
            LlmError::Http(HttpError::Api { message, .. }) => {
                format!("{provider} API error: {message}")
            }
            LlmError::Http(HttpError::Network(msg)) => format!("Network error: {msg}"),
            other => other.to_string(),
        }
    }
}

/// The seam the router talks to; implemented by [`crate::AnalysisClient`].
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Send `domains` with `prompt` to `provider` and return the extracted text.
    async fn analyze(
        &self,
        provider: Provider,
        credential: &str,
        domains: &[String],
        prompt: &str,
    ) -> Result<Analysis, LlmError>;

    /// Check that `credential` is accepted by `provider`.
    async fn probe(&self, provider: Provider, credential: &str) -> Result<ProbeOutcome, LlmError>;
}
