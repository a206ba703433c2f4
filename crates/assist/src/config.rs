use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    /// A local shell command reading the request as JSON on stdin.
    #[serde(rename = "command")]
    Command,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Command => "command",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
            ProviderKind::Command => "",
        }
    }

    pub fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Command => None,
        }
    }

    pub fn default_url(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1/chat/completions"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com/v1/messages"),
            ProviderKind::Command => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "command" => Ok(ProviderKind::Command),
            other => Err(format!(
                "unknown provider `{other}` (expected openai, anthropic or command)"
            )),
        }
    }
}

/// Settings shared by the lexicon-suggestion and tag-judgment workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub version: u32,
    pub provider: ProviderKind,
    /// Falls back to the provider's default model.
    pub model: Option<String>,
    /// Overrides the provider's endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Shell command for [`ProviderKind::Command`].
    pub command: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Lexicon entries per suggestion request.
    pub chunk_size: usize,
    /// Tags per judgment request.
    pub judge_chunk_size: usize,
    /// Requests in flight at once.
    pub max_concurrency: usize,
    /// Bytes of text either side of a lexicon term.
    pub context_window: usize,
    /// Bytes of text either side of a judged tag.
    pub judge_context_window: usize,
    /// Contexts gathered per lexicon entry.
    pub max_contexts: usize,
    #[serde(with = "crate::serde_millis")]
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            version: 1,
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key_env: None,
            command: None,
            temperature: 0.2,
            max_tokens: 1200,
            chunk_size: 20,
            judge_chunk_size: 25,
            max_concurrency: 4,
            context_window: 80,
            judge_context_window: 160,
            max_contexts: 2,
            timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
        }
    }
}

impl AssistConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_judge_chunk_size(mut self, size: usize) -> Self {
        self.judge_chunk_size = size;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_owned())
    }

    pub fn resolved_api_key_env(&self) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| self.provider.default_api_key_env().map(str::to_owned))
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.version == 0 {
            return Err(ProviderError::InvalidConfig("version must be >= 1".into()));
        }
        if self.chunk_size == 0 || self.judge_chunk_size == 0 {
            return Err(ProviderError::InvalidConfig(
                "chunk sizes must be greater than zero".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ProviderError::InvalidConfig(
                "max_concurrency must be greater than zero".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ProviderError::InvalidConfig(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ProviderError::InvalidConfig(
                "max_tokens must be greater than zero".into(),
            ));
        }
        if self.provider == ProviderKind::Command
            && self.command.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(ProviderError::InvalidConfig(
                "the command provider requires `command`".into(),
            ));
        }
        Ok(())
    }
}
