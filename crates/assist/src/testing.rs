//! Provider doubles for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::{Prompt, Provider};

type Script = dyn Fn(&Prompt) -> Result<String, ProviderError> + Send + Sync;

pub(crate) struct ScriptedProvider {
    script: Box<Script>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedProvider {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(&Prompt) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        (self.script)(prompt)
    }
}

/// The JSON list following `marker` in a prompt.
pub(crate) fn payload_after(prompt: &Prompt, marker: &str) -> Vec<Value> {
    let start = prompt.user.find(marker).map(|i| i + marker.len()).unwrap_or(0);
    serde_json::from_str::<Value>(prompt.user[start..].trim())
        .ok()
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
}
