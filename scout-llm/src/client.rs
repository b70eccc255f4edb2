use async_trait::async_trait;
use scout_http::HttpClient;

use crate::adapter::{parse_response, parse_usage, ProviderAdapter};
use crate::provider::Provider;
use crate::traits::{Analysis, Analyzer, LlmError, ProbeOutcome};

/// Issues exactly one outbound call per analysis or probe.
#[derive(Clone)]
pub struct AnalysisClient {
    http: HttpClient,
    adapter: ProviderAdapter,
}

impl AnalysisClient {
    pub fn new(http: HttpClient, adapter: ProviderAdapter) -> Self {
        Self { http, adapter }
    }

    pub fn adapter(&self) -> &ProviderAdapter {
        &self.adapter
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(
        &self,
        provider: Provider,
        credential: &str,
        domains: &[String],
        prompt: &str,
    ) -> Result<Analysis, LlmError> {
        let req = self
            .adapter
            .build_request(provider, credential, domains, prompt)?;
        tracing::info!(
            provider = %provider,
            model = self.adapter.model(provider),
            domains = domains.len(),
            "llm.analyze.start"
        );

        let resp = self.http.execute(&req).await?;
        let text = parse_response(provider, &resp.body);
        let usage = parse_usage(&resp.body);

        tracing::info!(
            provider = %provider,
            status = %resp.status,
            text_len = text.len(),
            has_usage = usage.is_some(),
            "llm.analyze.done"
        );
        Ok(Analysis {
            text,
            model: self.adapter.model(provider).to_string(),
            usage,
        })
    }

    async fn probe(&self, provider: Provider, credential: &str) -> Result<ProbeOutcome, LlmError> {
        let req = self.adapter.build_probe_request(provider, credential)?;
        let resp = self.http.execute(&req).await?;
        tracing::info!(provider = %provider, status = %resp.status, "llm.probe.ok");
        Ok(ProbeOutcome {
            status: resp.status.as_u16(),
        })
    }
}
