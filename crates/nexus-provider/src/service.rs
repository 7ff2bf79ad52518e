//! The externally consumed query entry point.

use crate::backends::{ProviderClient, DEFAULT_RUN_TIMEOUT};
use crate::failover::{FallbackOrchestrator, Resolution, RetryPolicy};
use crate::registry::ProviderRegistry;
use nexus_core::{NexusError, NexusResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Stable response shape for one handled query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Whether a usable text result was produced.
    pub success: bool,
    /// The answer text on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_text: Option<String>,
    /// Tools the run invoked, in execution order.
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Chained label of the providers attempted, e.g. `gemini->openai`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    /// Wall-clock time spent handling the query.
    pub execution_time_seconds: f64,
    /// Error detail when `success` is false. May embed raw provider text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Combines the fallback orchestrator and result extractor into the one
/// call a request handler invokes.
///
/// Holds only shared read-only state, so a single instance serves
/// concurrent requests.
pub struct QueryService {
    registry: Arc<ProviderRegistry>,
    policy: RetryPolicy,
    run_timeout: Duration,
}

impl QueryService {
    /// Creates a service over the startup-initialized provider registry.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            policy: RetryPolicy::default(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Overrides the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the per-provider run timeout.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// The registry this service routes over.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    fn candidates(
        &self,
        model_preference: Option<&str>,
    ) -> NexusResult<Vec<Arc<dyn ProviderClient>>> {
        match model_preference {
            // A specific provider narrows the chain to that provider alone;
            // an unconfigured one is an error, never a silent substitution.
            Some(name) if name != "auto" => match self.registry.get(name) {
                Some(descriptor) => Ok(vec![descriptor.client.clone()]),
                None => Err(NexusError::ProviderUnavailable(name.to_string())),
            },
            _ => Ok(self.registry.clients()),
        }
    }

    /// Handles one query end to end.
    ///
    /// Fails fast with `EmptyQuery` or `ProviderUnavailable` before any
    /// provider is contacted; every orchestrated outcome, including soft
    /// failures, comes back as an `Ok(QueryOutcome)`.
    pub async fn handle(
        &self,
        query: &str,
        model_preference: Option<&str>,
    ) -> NexusResult<QueryOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(NexusError::EmptyQuery);
        }

        let candidates = self.candidates(model_preference)?;
        let started = Instant::now();

        info!(
            preference = model_preference.unwrap_or("auto"),
            candidates = candidates.len(),
            "Handling query"
        );

        let orchestrator =
            FallbackOrchestrator::new(candidates, self.policy.clone(), self.run_timeout);
        let resolution = orchestrator.run(query).await;
        let execution_time_seconds = started.elapsed().as_secs_f64();

        Ok(match resolution {
            Resolution::Success {
                extracted,
                provider_used,
                ..
            } => QueryOutcome {
                success: true,
                result_text: Some(extracted.text),
                tools_used: extracted.tools_used,
                provider_used: Some(provider_used),
                execution_time_seconds,
                error: None,
            },
            Resolution::NoExtractableText {
                provider_used,
                detail,
                ..
            } => QueryOutcome {
                success: false,
                result_text: None,
                tools_used: Vec::new(),
                provider_used: Some(provider_used),
                execution_time_seconds,
                error: Some(detail),
            },
            Resolution::Exhausted {
                attempts,
                last_error,
            } => {
                let attempted: Vec<&str> =
                    attempts.iter().map(|a| a.provider.as_str()).collect();
                QueryOutcome {
                    success: false,
                    result_text: None,
                    tools_used: Vec::new(),
                    provider_used: None,
                    execution_time_seconds,
                    error: Some(format!(
                        "all providers failed [{}]: {last_error}",
                        attempted.join(", ")
                    )),
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nexus_core::{NexusResult, RunHandle, RunOutcome, RunPayload, RunState};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provider stub that always answers with the same text.
    struct AlwaysAnswers {
        name: &'static str,
        text: &'static str,
        calls: AtomicU32,
    }

    impl AlwaysAnswers {
        fn new(name: &'static str, text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                text,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderClient for AlwaysAnswers {
        fn name(&self) -> &str {
            self.name
        }

        async fn submit(&self, _query: &str) -> NexusResult<RunHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RunHandle::new("run"))
        }

        async fn await_completion(
            &self,
            _handle: &RunHandle,
            _timeout: Duration,
        ) -> NexusResult<RunOutcome> {
            Ok(RunOutcome {
                state: RunState::Complete,
                payload: RunPayload {
                    result: Some(self.text.to_string()),
                    ..RunPayload::default()
                },
            })
        }
    }

    fn service_with(providers: Vec<Arc<dyn ProviderClient>>) -> QueryService {
        let mut builder = ProviderRegistry::builder();
        for p in providers {
            builder = builder.register(p);
        }
        QueryService::new(Arc::new(builder.build()))
    }

    #[tokio::test]
    async fn empty_query_contacts_no_provider() {
        let p1 = AlwaysAnswers::new("gemini", "unused");
        let service = service_with(vec![p1.clone()]);

        for query in ["", "   ", "\n\t"] {
            let err = service.handle(query, None).await.unwrap_err();
            assert!(matches!(err, NexusError::EmptyQuery));
        }
        assert_eq!(p1.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_preference_is_rejected_without_network() {
        let p1 = AlwaysAnswers::new("mistral", "unused");
        let service = service_with(vec![p1.clone()]);

        let err = service.handle("hi", Some("openai")).await.unwrap_err();
        assert!(matches!(err, NexusError::ProviderUnavailable(name) if name == "openai"));
        assert_eq!(p1.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn specific_preference_narrows_to_that_provider() {
        let p1 = AlwaysAnswers::new("gemini", "from gemini");
        let p2 = AlwaysAnswers::new("mistral", "from mistral");
        let service = service_with(vec![p1.clone(), p2.clone()]);

        let outcome = service.handle("hi", Some("mistral")).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result_text.as_deref(), Some("from mistral"));
        assert_eq!(outcome.provider_used.as_deref(), Some("mistral"));
        assert_eq!(p1.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auto_preference_uses_full_chain() {
        let p1 = AlwaysAnswers::new("gemini", "primary");
        let service = service_with(vec![p1.clone()]);

        let outcome = service.handle("hi", Some("auto")).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.provider_used.as_deref(), Some("gemini"));
        assert!(outcome.execution_time_seconds >= 0.0);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_attempted_providers() {
        struct AlwaysFails;

        #[async_trait]
        impl ProviderClient for AlwaysFails {
            fn name(&self) -> &str {
                "gemini"
            }

            async fn submit(&self, _query: &str) -> NexusResult<RunHandle> {
                Err(NexusError::Provider("model offline".into()))
            }

            async fn await_completion(
                &self,
                _handle: &RunHandle,
                _timeout: Duration,
            ) -> NexusResult<RunOutcome> {
                unreachable!("submit always fails")
            }
        }

        let service = service_with(vec![Arc::new(AlwaysFails)]);
        let outcome = service.handle("hi", None).await.unwrap();

        assert!(!outcome.success);
        assert!(outcome.provider_used.is_none());
        let error = outcome.error.unwrap();
        assert!(error.contains("gemini"), "got: {error}");
        assert!(error.contains("model offline"), "got: {error}");
    }
}
