use super::ProviderClient;
use crate::config::{PlannerConfig, ProviderConfig};
use async_trait::async_trait;
use nexus_core::{NexusError, NexusResult, RunHandle, RunOutcome, RunPayload, RunState};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Interval between run-state polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Agent-platform-backed provider client.
///
/// Submits a query as a multi-step run on the planning platform and observes
/// it by polling until the run reaches a terminal state. One instance exists
/// per configured provider; they differ only in provider kind, model, and
/// credentials.
pub struct PlannerClient {
    provider: ProviderConfig,
    planner: PlannerConfig,
    http: reqwest::Client,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct RunStatus {
    state: RunState,
    #[serde(default)]
    outputs: Option<RunPayload>,
    #[serde(default)]
    error: Option<String>,
}

impl PlannerClient {
    /// Creates a client for `provider` against the given planning platform.
    pub fn new(provider: ProviderConfig, planner: PlannerConfig) -> Self {
        Self {
            provider,
            planner,
            http: reqwest::Client::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the poll interval (used by tests to avoid real waits).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.planner.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn fetch_status(&self, handle: &RunHandle) -> NexusResult<RunStatus> {
        let url = format!("{}/v1/runs/{}", self.planner.base_url, handle.id);
        let resp = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NexusError::Provider(format!(
                "planner API error {status}: {body}"
            )));
        }

        resp.json::<RunStatus>()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for PlannerClient {
    fn name(&self) -> &str {
        self.provider.kind.as_str()
    }

    async fn submit(&self, query: &str) -> NexusResult<RunHandle> {
        if !self.provider.has_credentials() {
            return Err(NexusError::ProviderUnavailable(self.name().to_string()));
        }

        let url = format!("{}/v1/runs", self.planner.base_url);
        let body = serde_json::json!({
            "query": query,
            "provider": self.provider.kind,
            "model": self.provider.model_id,
            "temperature": self.provider.temperature,
            "max_tokens": self.provider.max_tokens,
        });

        let resp = self
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NexusError::Provider(format!(
                "planner API error {status}: {body}"
            )));
        }

        let submitted: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        debug!(provider = self.name(), run_id = %submitted.run_id, "Run submitted");
        Ok(RunHandle::new(submitted.run_id))
    }

    async fn await_completion(
        &self,
        handle: &RunHandle,
        timeout: Duration,
    ) -> NexusResult<RunOutcome> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let status = self.fetch_status(handle).await?;

            if status.state.is_terminal() {
                let mut payload = status.outputs.unwrap_or_default();
                if payload.error.is_none() {
                    payload.error = status.error;
                }
                return Ok(RunOutcome {
                    state: status.state,
                    payload,
                });
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(NexusError::RunTimeout(format!(
                    "run {} still {:?} after {timeout:?}",
                    handle.id, status.state
                )));
            }

            debug!(provider = self.name(), run_id = %handle.id, state = ?status.state, "Run not terminal, polling");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
