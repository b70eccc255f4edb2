//! Provider adaptation for Domain Scout.
//!
//! One static [`ProviderDescriptor`] per [`Provider`] describes where and how
//! to call each service; [`ProviderAdapter`] turns a domain list and a prompt
//! into a provider-specific [`scout_http::PreparedRequest`] and pulls the reply
//! text back out. [`AnalysisClient`] ties the adapter to an HTTP client behind
//! the [`Analyzer`] trait.
//!
//! # Examples
//! ```no_run
//! use scout_llm::{AnalysisClient, Analyzer, Provider, ProviderAdapter};
//! use scout_http::HttpClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), scout_llm::LlmError> {
//! let client = AnalysisClient::new(HttpClient::new()?, ProviderAdapter::default());
//! let out = client
//!     .analyze(Provider::OpenAi, "sk-...", &["example.com".into()], "Rank these")
//!     .await?;
//! println!("{}", out.text);
//! # Ok(())
//! # }
//! ```
pub mod adapter;
pub mod client;
pub mod provider;
pub mod traits;

pub use adapter::{parse_response, parse_usage, ProviderAdapter, ProviderOverride, NO_RESPONSE};
pub use client::AnalysisClient;
pub use provider::{BodyShape, CredentialTransport, Provider, ProviderDescriptor};
pub use traits::{Analysis, Analyzer, LlmError, ProbeOutcome};

/// Prompt used when the user has not stored one of their own.
pub const DEFAULT_PROMPT: &str = "Please analyze the following list of domains and identify the ones most relevant for a digital marketing strategy focused on lead generation. Rank them by relevance and briefly justify your choice for the top 5.";
