//! Completion providers.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{AssistConfig, ProviderKind};
use crate::error::ProviderError;

/// One request: a system instruction and the user payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// A model that turns a prompt into raw completion text.
///
/// Implementations do not retry; callers wrap them with
/// [`execute_with_retry`](crate::execute_with_retry).
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// Parse a JSON object out of completion text, tolerating prose or code
/// fences around it.
pub fn json_from_text(text: &str) -> Result<Value, ProviderError> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(value);
    }
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ProviderError::InvalidResponse("no JSON object in response".into()));
    };
    if end <= start {
        return Err(ProviderError::InvalidResponse("no JSON object in response".into()));
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| ProviderError::InvalidResponse(format!("invalid JSON: {e}")))
}

fn http_client(config: &AssistConfig) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| ProviderError::InvalidConfig(format!("cannot build HTTP client: {e}")))
}

fn api_key(config: &AssistConfig) -> Result<String, ProviderError> {
    let var = config
        .resolved_api_key_env()
        .ok_or_else(|| ProviderError::InvalidConfig("no API key variable configured".into()))?;
    match std::env::var(&var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ProviderError::MissingCredential(var)),
    }
}

async fn post_json(request: reqwest::RequestBuilder, payload: &Value) -> Result<Value, ProviderError> {
    let response = request
        .json(payload)
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status { status, body });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("invalid JSON response: {e}")))
}

fn text_at(value: &Value, pointer: &str) -> Result<String, ProviderError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("response has no `{pointer}`")))
}

/// OpenAI-compatible chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(config: &AssistConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(config)?,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ProviderKind::OpenAi.default_url().unwrap_or_default().to_owned()),
            api_key: api_key(config)?,
            model: config.resolved_model(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "temperature": self.temperature,
        });
        let request = self.client.post(&self.url).bearer_auth(&self.api_key);
        let response = post_json(request, &payload).await?;
        text_at(&response, "/choices/0/message/content")
    }
}

/// Anthropic messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: &AssistConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(config)?,
            url: config.base_url.clone().unwrap_or_else(|| {
                ProviderKind::Anthropic
                    .default_url()
                    .unwrap_or_default()
                    .to_owned()
            }),
            api_key: api_key(config)?,
            model: config.resolved_model(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": prompt.system,
            "messages": [{"role": "user", "content": prompt.user}],
        });
        let request = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let response = post_json(request, &payload).await?;
        text_at(&response, "/content/0/text")
    }
}

/// Runs a shell command per request. The command reads
/// `{system, user, model, temperature, max_tokens}` as JSON on stdin and
/// prints the completion on stdout.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    command: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl CommandProvider {
    pub fn new(config: &AssistConfig) -> Result<Self, ProviderError> {
        let command = config
            .command
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidConfig("the command provider requires `command`".into())
            })?;
        Ok(Self {
            command,
            model: config.resolved_model(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Provider for CommandProvider {
    fn name(&self) -> &str {
        "command"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let payload = json!({
            "system": prompt.system,
            "user": prompt.user,
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
        .to_string();

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProviderError::Command(format!("cannot start `{}`: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| ProviderError::Command(format!("cannot write request: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProviderError::Command(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            debug!(status = ?output.status.code(), "provider command failed");
            return Err(ProviderError::Command(if stderr.is_empty() {
                format!("`{}` exited with {}", self.command, output.status)
            } else {
                stderr
            }));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| ProviderError::InvalidResponse(format!("command output is not UTF-8: {e}")))
    }
}

/// Provider selected by `config.provider`.
pub fn build_provider(config: &AssistConfig) -> Result<Box<dyn Provider>, ProviderError> {
    config.validate()?;
    Ok(match config.provider {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(config)?),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(config)?),
        ProviderKind::Command => Box::new(CommandProvider::new(config)?),
    })
}
