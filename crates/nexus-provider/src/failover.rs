//! Retry and fallback orchestration across the configured providers.

use crate::backends::ProviderClient;
use crate::extract::extract;
use nexus_core::{
    AttemptOutcome, ErrorKind, ExtractedResult, NexusError, NexusResult, RunOutcome, RunState,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Configures retry behaviour for failover across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts per provider before advancing to the next one.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// Classifies a provider error into the retry taxonomy.
///
/// Rate-limit and quota signals (429, "rate limit", "quota", "capacity
/// exceeded") are retried with backoff; timeouts and network/server hiccups
/// get a limited retry too; everything else is permanent and skips straight
/// to the next provider.
pub fn classify(err: &NexusError) -> ErrorKind {
    if matches!(err, NexusError::RunTimeout(_)) {
        return ErrorKind::Timeout;
    }

    let lower = err.to_string().to_lowercase();

    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("quota")
        || lower.contains("capacity exceeded")
        || lower.contains("too many requests")
    {
        ErrorKind::RateLimited
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else if lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("connection")
        || lower.contains("network")
    {
        ErrorKind::Transient
    } else {
        ErrorKind::Permanent
    }
}

/// Computes the backoff delay for a given attempt using exponential backoff
/// capped at `max_delay_ms`.
fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.max_delay_ms)
}

/// Terminal resolution of one orchestrated query.
#[derive(Debug)]
pub enum Resolution {
    /// A provider completed the run and text was extracted.
    Success {
        /// The normalized result.
        extracted: ExtractedResult,
        /// Chained label of the providers attempted, e.g. `gemini->openai`.
        provider_used: String,
        /// Telemetry for every attempt made.
        attempts: Vec<AttemptOutcome>,
    },
    /// The run completed but produced no extractable text.
    ///
    /// This is a user-visible soft failure, distinct from a provider error;
    /// no further fallback is attempted because the run itself succeeded.
    NoExtractableText {
        /// Chained label of the providers attempted.
        provider_used: String,
        /// Telemetry for every attempt made.
        attempts: Vec<AttemptOutcome>,
        /// The payload that yielded no text, for diagnostics.
        raw: serde_json::Value,
        /// Human-readable description of what was missing.
        detail: String,
    },
    /// Every candidate provider was exhausted without a completed run.
    Exhausted {
        /// Telemetry for every attempt made.
        attempts: Vec<AttemptOutcome>,
        /// Detail of the last error observed.
        last_error: String,
    },
}

/// Drives an ordered list of provider clients with per-provider retries.
///
/// For each provider it submits the query and awaits the run. Rate-limited
/// and transient failures retry the same provider with exponential backoff,
/// up to `max_retries` attempts; permanent failures, timeouts, and cancelled
/// runs advance to the next provider immediately, carrying no backoff
/// penalty over. A completed run ends the chain either way: extracted text
/// is a success, an empty payload is surfaced as a soft failure.
pub struct FallbackOrchestrator {
    candidates: Vec<Arc<dyn ProviderClient>>,
    policy: RetryPolicy,
    run_timeout: Duration,
    /// Injectable sleep function for testing (allows skipping real delays).
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl FallbackOrchestrator {
    /// Creates an orchestrator over `candidates` in priority order.
    pub fn new(
        candidates: Vec<Arc<dyn ProviderClient>>,
        policy: RetryPolicy,
        run_timeout: Duration,
    ) -> Self {
        Self {
            candidates,
            policy,
            run_timeout,
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn execute_once(
        &self,
        client: &dyn ProviderClient,
        query: &str,
    ) -> NexusResult<RunOutcome> {
        let handle = client.submit(query).await?;
        client.await_completion(&handle, self.run_timeout).await
    }

    /// Runs `query` through the candidate chain until a terminal resolution.
    pub async fn run(&self, query: &str) -> Resolution {
        let mut attempts: Vec<AttemptOutcome> = Vec::new();
        let mut tried: Vec<String> = Vec::new();
        let mut last_error = String::from("no providers configured");

        for client in &self.candidates {
            let name = client.name().to_string();
            tried.push(name.clone());

            for attempt in 0..self.policy.max_retries.max(1) {
                let started = Instant::now();
                let result = self.execute_once(client.as_ref(), query).await;
                let elapsed = started.elapsed();

                let (err, forced_kind) = match result {
                    Ok(outcome) if outcome.state == RunState::Complete => {
                        attempts.push(AttemptOutcome {
                            provider: name.clone(),
                            success: true,
                            error_kind: None,
                            elapsed,
                        });
                        let provider_used = tried.join("->");
                        info!(provider = %provider_used, ?elapsed, "Run completed");

                        return match extract(&outcome) {
                            Ok(extracted) => Resolution::Success {
                                extracted,
                                provider_used,
                                attempts,
                            },
                            Err(e) => Resolution::NoExtractableText {
                                provider_used,
                                attempts,
                                raw: serde_json::to_value(&outcome.payload)
                                    .unwrap_or_default(),
                                detail: e.to_string(),
                            },
                        };
                    }
                    Ok(outcome) => {
                        // Cancelled runs are permanent regardless of error text.
                        let forced = (outcome.state == RunState::Cancelled)
                            .then_some(ErrorKind::Permanent);
                        let detail = outcome
                            .payload
                            .error
                            .unwrap_or_else(|| format!("run ended in state {:?}", outcome.state));
                        (NexusError::Provider(detail), forced)
                    }
                    Err(e) => (e, None),
                };

                let kind = forced_kind.unwrap_or_else(|| classify(&err));

                attempts.push(AttemptOutcome {
                    provider: name.clone(),
                    success: false,
                    error_kind: Some(kind),
                    elapsed,
                });
                last_error = err.to_string();

                let retryable = matches!(kind, ErrorKind::RateLimited | ErrorKind::Transient);
                if retryable && attempt + 1 < self.policy.max_retries {
                    let delay = compute_backoff(&self.policy, attempt);
                    info!(
                        provider = %name,
                        attempt,
                        delay_ms = delay,
                        error = %err,
                        "Retryable error, backing off"
                    );
                    self.do_sleep(delay).await;
                } else {
                    warn!(
                        provider = %name,
                        attempt,
                        kind = ?kind,
                        error = %err,
                        "Provider failed, moving to next"
                    );
                    break;
                }
            }
        }

        Resolution::Exhausted {
            attempts,
            last_error,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nexus_core::{NexusResult, RunHandle, RunPayload, StepOutput};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// A mock provider that returns a scripted sequence of run results.
    struct MockProvider {
        name: &'static str,
        results: tokio::sync::Mutex<Vec<NexusResult<RunOutcome>>>,
        calls: AtomicU32,
    }

    impl MockProvider {
        fn new(name: &'static str, results: Vec<NexusResult<RunOutcome>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                results: tokio::sync::Mutex::new(results),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderClient for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn submit(&self, _query: &str) -> NexusResult<RunHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RunHandle::new("mock-run"))
        }

        async fn await_completion(
            &self,
            _handle: &RunHandle,
            _timeout: Duration,
        ) -> NexusResult<RunOutcome> {
            let mut results = self.results.lock().await;
            if results.is_empty() {
                Err(NexusError::Provider("MockProvider: no more results".into()))
            } else {
                results.remove(0)
            }
        }
    }

    fn completed_with_result(text: &str) -> NexusResult<RunOutcome> {
        Ok(RunOutcome {
            state: RunState::Complete,
            payload: RunPayload {
                result: Some(text.to_string()),
                ..RunPayload::default()
            },
        })
    }

    fn completed_with_final_value(value: &str) -> NexusResult<RunOutcome> {
        Ok(RunOutcome {
            state: RunState::Complete,
            payload: RunPayload {
                final_output: Some(StepOutput {
                    value: Some(value.to_string()),
                    summary: None,
                }),
                ..RunPayload::default()
            },
        })
    }

    fn failed_with(error: &str) -> NexusResult<RunOutcome> {
        Ok(RunOutcome {
            state: RunState::Failed,
            payload: RunPayload {
                error: Some(error.to_string()),
                ..RunPayload::default()
            },
        })
    }

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    fn orchestrator(
        candidates: Vec<Arc<dyn ProviderClient>>,
        policy: RetryPolicy,
    ) -> FallbackOrchestrator {
        FallbackOrchestrator {
            candidates,
            policy,
            run_timeout: Duration::from_secs(60),
            sleep_fn: Some(Box::new(|_| Box::pin(async {}))),
        }
    }

    // ── First provider succeeds: no one else is invoked ──────────────────

    #[tokio::test]
    async fn first_provider_success_invokes_no_fallback() {
        let p1 = MockProvider::new("gemini", vec![completed_with_result("hello")]);
        let p2 = MockProvider::new("mistral", vec![completed_with_result("unused")]);

        let orch = orchestrator(vec![p1.clone(), p2.clone()], instant_policy());
        let resolution = orch.run("hi").await;

        match resolution {
            Resolution::Success {
                extracted,
                provider_used,
                attempts,
            } => {
                assert_eq!(extracted.text, "hello");
                assert_eq!(provider_used, "gemini");
                assert_eq!(attempts.len(), 1);
            }
            other => panic!("Expected Success, got {other:?}"),
        }
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);
    }

    // ── Rate limits: bounded retries with exponentially increasing delays ─

    #[tokio::test]
    async fn rate_limited_provider_retries_then_advances() {
        let p1 = MockProvider::new(
            "gemini",
            vec![
                failed_with("429 Too Many Requests"),
                failed_with("429 Too Many Requests"),
                failed_with("429 Too Many Requests"),
            ],
        );
        let p2 = MockProvider::new("mistral", vec![completed_with_result("fallback ok")]);

        let delays = Arc::new(Mutex::new(Vec::<u64>::new()));
        let recorder = delays.clone();

        let orch = FallbackOrchestrator {
            candidates: vec![p1.clone(), p2.clone()],
            policy: RetryPolicy {
                max_retries: 3,
                base_delay_ms: 500,
                max_delay_ms: 30_000,
            },
            run_timeout: Duration::from_secs(60),
            sleep_fn: Some(Box::new(move |ms| {
                recorder.lock().unwrap().push(ms);
                Box::pin(async {})
            })),
        };

        let resolution = orch.run("hi").await;

        match resolution {
            Resolution::Success { provider_used, .. } => {
                assert_eq!(provider_used, "gemini->mistral");
            }
            other => panic!("Expected Success, got {other:?}"),
        }

        // Exactly max_retries calls on the rate-limited provider, with
        // strictly increasing base·2^n delays between them.
        assert_eq!(p1.calls(), 3);
        assert_eq!(*delays.lock().unwrap(), vec![500, 1000]);
    }

    // ── Permanent errors skip retries immediately ────────────────────────

    #[tokio::test]
    async fn permanent_error_skips_to_next_provider() {
        let p1 = MockProvider::new(
            "gemini",
            vec![
                failed_with("invalid request: unsupported model"),
                completed_with_result("should not reach"),
            ],
        );
        let p2 = MockProvider::new("mistral", vec![completed_with_result("fallback ok")]);

        let orch = orchestrator(vec![p1.clone(), p2.clone()], instant_policy());
        let resolution = orch.run("hi").await;

        match resolution {
            Resolution::Success {
                extracted,
                provider_used,
                ..
            } => {
                assert_eq!(extracted.text, "fallback ok");
                assert_eq!(provider_used, "gemini->mistral");
            }
            other => panic!("Expected Success, got {other:?}"),
        }
        assert_eq!(p1.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_run_advances_immediately() {
        let p1 = MockProvider::new(
            "gemini",
            vec![Ok(RunOutcome {
                state: RunState::Cancelled,
                payload: RunPayload::default(),
            })],
        );
        let p2 = MockProvider::new("mistral", vec![completed_with_result("ok")]);

        let orch = orchestrator(vec![p1.clone(), p2.clone()], instant_policy());
        let resolution = orch.run("hi").await;

        assert!(matches!(resolution, Resolution::Success { .. }));
        assert_eq!(p1.calls(), 1);
    }

    // ── Fallback chain label (scenario: P1 fails hard, P2 answers "7") ───

    #[tokio::test]
    async fn chained_label_after_fallback() {
        let p1 = MockProvider::new("gemini", vec![failed_with("model decommissioned")]);
        let p2 = MockProvider::new("openai", vec![completed_with_final_value("7")]);

        let orch = orchestrator(vec![p1, p2], instant_policy());
        let resolution = orch.run("what is 3 + 4?").await;

        match resolution {
            Resolution::Success {
                extracted,
                provider_used,
                ..
            } => {
                assert_eq!(extracted.text, "7");
                assert_eq!(provider_used, "gemini->openai");
            }
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    // ── Completed run without text: soft failure, no silent fallback ─────

    #[tokio::test]
    async fn empty_payload_is_soft_failure_without_fallback() {
        let p1 = MockProvider::new(
            "gemini",
            vec![Ok(RunOutcome {
                state: RunState::Complete,
                payload: RunPayload::default(),
            })],
        );
        let p2 = MockProvider::new("mistral", vec![completed_with_result("unused")]);

        let orch = orchestrator(vec![p1.clone(), p2.clone()], instant_policy());
        let resolution = orch.run("hi").await;

        match resolution {
            Resolution::NoExtractableText { provider_used, .. } => {
                assert_eq!(provider_used, "gemini");
            }
            other => panic!("Expected NoExtractableText, got {other:?}"),
        }
        assert_eq!(p2.calls(), 0);
    }

    // ── Exhaustion carries the last error and every attempt ──────────────

    #[tokio::test]
    async fn all_providers_exhausted_returns_last_error() {
        let p1 = MockProvider::new("gemini", vec![failed_with("bad plan")]);
        let p2 = MockProvider::new("mistral", vec![failed_with("model offline")]);

        let orch = orchestrator(vec![p1, p2], instant_policy());
        let resolution = orch.run("hi").await;

        match resolution {
            Resolution::Exhausted {
                attempts,
                last_error,
            } => {
                assert!(last_error.contains("model offline"), "got: {last_error}");
                let providers: Vec<&str> =
                    attempts.iter().map(|a| a.provider.as_str()).collect();
                assert_eq!(providers, vec!["gemini", "mistral"]);
            }
            other => panic!("Expected Exhausted, got {other:?}"),
        }
    }

    // ── Backoff timing computation ───────────────────────────────────────

    #[test]
    fn backoff_computation() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        };

        assert_eq!(compute_backoff(&policy, 0), 500); // 500 * 2^0
        assert_eq!(compute_backoff(&policy, 1), 1000); // 500 * 2^1
        assert_eq!(compute_backoff(&policy, 2), 2000); // 500 * 2^2
        assert_eq!(compute_backoff(&policy, 3), 4000); // 500 * 2^3
        assert_eq!(compute_backoff(&policy, 6), 30_000); // capped at max
    }

    // ── Error classification ─────────────────────────────────────────────

    #[test]
    fn classification_table() {
        use ErrorKind::*;

        let cases = [
            ("429 Too Many Requests", RateLimited),
            ("capacity exceeded for model", RateLimited),
            ("monthly quota reached", RateLimited),
            ("connection reset by peer", Transient),
            ("502 Bad Gateway", Transient),
            ("invalid request payload", Permanent),
            ("model not found", Permanent),
        ];

        for (text, expected) in cases {
            let err = NexusError::Provider(text.to_string());
            assert_eq!(classify(&err), expected, "for: {text}");
        }

        assert_eq!(
            classify(&NexusError::RunTimeout("run r-1 still Running".into())),
            Timeout
        );
        assert_eq!(
            classify(&NexusError::ProviderUnavailable("openai".into())),
            Permanent
        );
    }
}
