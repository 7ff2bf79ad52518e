use super::ProviderClient;
use crate::config::ProviderConfig;
use async_trait::async_trait;
use nexus_core::{NexusError, NexusResult, RunHandle, RunOutcome, RunPayload, RunState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Direct single-turn chat-completion client.
///
/// No planning platform is involved: `submit` parks the query under a fresh
/// handle, and `await_completion` performs one chat-completions call and
/// synthesizes a completed run whose payload carries the response text. This
/// is the final link in the default fallback chain.
pub struct DirectChatClient {
    name: String,
    config: ProviderConfig,
    http: reqwest::Client,
    pending: Mutex<HashMap<String, String>>,
}

impl DirectChatClient {
    /// Creates a direct chat client published under `name` (e.g. `mistral-direct`).
    pub fn new(name: impl Into<String>, config: ProviderConfig) -> Self {
        Self {
            name: name.into(),
            config,
            http: reqwest::Client::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    async fn complete(&self, query: &str, timeout: Duration) -> NexusResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "messages": [{"role": "user", "content": query}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send();

        let resp = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| {
                NexusError::RunTimeout(format!("{} chat call exceeded {timeout:?}", self.name))
            })?
            .map_err(|e| NexusError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(NexusError::Provider(format!(
                "{} API error {status}: {resp_body}",
                self.name
            )));
        }

        let content = resp_body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        if content.is_empty() {
            return Err(NexusError::Provider(format!(
                "{} returned no message content",
                self.name
            )));
        }

        Ok(content)
    }
}

#[async_trait]
impl ProviderClient for DirectChatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, query: &str) -> NexusResult<RunHandle> {
        if !self.config.has_credentials() {
            return Err(NexusError::ProviderUnavailable(self.name.clone()));
        }

        let handle = RunHandle::new(Uuid::new_v4().to_string());
        self.pending
            .lock()
            .insert(handle.id.clone(), query.to_string());
        debug!(provider = %self.name, run_id = %handle.id, "Chat query parked");
        Ok(handle)
    }

    async fn await_completion(
        &self,
        handle: &RunHandle,
        timeout: Duration,
    ) -> NexusResult<RunOutcome> {
        let query = self.pending.lock().remove(&handle.id).ok_or_else(|| {
            NexusError::Provider(format!("unknown run handle: {}", handle.id))
        })?;

        let text = self.complete(&query, timeout).await?;

        Ok(RunOutcome {
            state: RunState::Complete,
            payload: RunPayload {
                result: Some(text),
                ..RunPayload::default()
            },
        })
    }
}
