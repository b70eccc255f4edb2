use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::traits::LlmError;

/// The closed set of supported language-model services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    Claude,
    Mistral,
    Cohere,
    Llama,
}

/// How the credential travels with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialTransport {
    Bearer,
    Header(&'static str),
    Query(&'static str),
}

/// Wire shape of the chat request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// `model` + `messages` (system prompt, then user list)
    ChatMessages,
    /// `contents[0].parts[0].text` + `generationConfig`
    GeminiContents,
    /// `model` + `max_tokens` + single user message
    ClaudeMessages,
    /// `model` + single `prompt` string
    CoherePrompt,
}

/// Static per-provider wiring. Never mutated at runtime.
#[derive(Debug, Clone, Copy)]
pub struct ProviderDescriptor {
    pub base_url: &'static str,
    pub probe_endpoint: &'static str,
    /// `{model}` is substituted when present.
    pub chat_endpoint: &'static str,
    pub credential: CredentialTransport,
    pub extra_headers: &'static [(&'static str, &'static str)],
    pub default_model: &'static str,
    pub body: BodyShape,
}

const OPENAI: ProviderDescriptor = ProviderDescriptor {
    base_url: "https://api.openai.com/v1",
    probe_endpoint: "/models",
    chat_endpoint: "/chat/completions",
    credential: CredentialTransport::Bearer,
    extra_headers: &[],
    default_model: "gpt-3.5-turbo",
    body: BodyShape::ChatMessages,
};

const MISTRAL: ProviderDescriptor = ProviderDescriptor {
    base_url: "https://api.mistral.ai/v1",
    default_model: "mistral-tiny",
    ..OPENAI
};

const LLAMA: ProviderDescriptor = ProviderDescriptor {
    base_url: "https://api.llama-api.com/v1",
    default_model: "llama-2-7b-chat",
    ..OPENAI
};

const GEMINI: ProviderDescriptor = ProviderDescriptor {
    base_url: "https://generativelanguage.googleapis.com/v1beta",
    probe_endpoint: "/models",
    chat_endpoint: "/models/{model}:generateContent",
    credential: CredentialTransport::Query("key"),
    extra_headers: &[],
    default_model: "gemini-pro",
    body: BodyShape::GeminiContents,
};

const CLAUDE: ProviderDescriptor = ProviderDescriptor {
    base_url: "https://api.anthropic.com/v1",
    // No listing endpoint; the probe is a one-token chat call.
    probe_endpoint: "/messages",
    chat_endpoint: "/messages",
    credential: CredentialTransport::Header("x-api-key"),
    extra_headers: &[("anthropic-version", "2023-06-01")],
    default_model: "claude-3-sonnet-20240229",
    body: BodyShape::ClaudeMessages,
};

const COHERE: ProviderDescriptor = ProviderDescriptor {
    base_url: "https://api.cohere.ai/v1",
    probe_endpoint: "/models",
    chat_endpoint: "/generate",
    credential: CredentialTransport::Bearer,
    extra_headers: &[],
    default_model: "command",
    body: BodyShape::CoherePrompt,
};

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::OpenAi,
        Provider::Gemini,
        Provider::Claude,
        Provider::Mistral,
        Provider::Cohere,
        Provider::Llama,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::Mistral => "mistral",
            Provider::Cohere => "cohere",
            Provider::Llama => "llama",
        }
    }

    pub fn descriptor(&self) -> &'static ProviderDescriptor {
        match self {
            Provider::OpenAi => &OPENAI,
            Provider::Gemini => &GEMINI,
            Provider::Claude => &CLAUDE,
            Provider::Mistral => &MISTRAL,
            Provider::Cohere => &COHERE,
            Provider::Llama => &LLAMA,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    /// ```
    /// use scout_llm::Provider;
    ///
    /// assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Gemini);
    /// assert!("bard".parse::<Provider>().is_err());
    /// ```
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.id() == needle)
            .ok_or_else(|| LlmError::UnsupportedProvider(raw.to_string()))
    }
}
