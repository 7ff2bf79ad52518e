pub mod chat;
pub mod planner;

use async_trait::async_trait;
use nexus_core::{NexusResult, RunHandle, RunOutcome};
use std::time::Duration;

/// Default ceiling on how long `await_completion` waits for a terminal state.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// Uniform interface over one configured query-execution backend.
///
/// A client may be backed by the agent-planning platform (multi-step run,
/// observed by polling) or by a direct single-turn chat call; the
/// orchestrator treats both identically.
///
/// To add a new backend:
/// 1. Create a new module in `backends/`
/// 2. Implement `ProviderClient` for your struct
/// 3. Register it in the provider registry at startup
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable name used in labels, preferences, and logs.
    fn name(&self) -> &str;

    /// Submits a query for execution and returns the run's handle.
    ///
    /// Fails with `ProviderUnavailable` when the provider was never
    /// successfully initialized (e.g. missing credentials).
    async fn submit(&self, query: &str) -> NexusResult<RunHandle>;

    /// Waits until the run reaches a terminal state or `timeout` elapses.
    ///
    /// Waiting suspends the calling task, never the process. Returns
    /// `RunTimeout` when the deadline passes first.
    async fn await_completion(
        &self,
        handle: &RunHandle,
        timeout: Duration,
    ) -> NexusResult<RunOutcome>;
}
