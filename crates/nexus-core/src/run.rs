use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a provider-side run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Accepted by the provider but not started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully; outputs are available.
    Complete,
    /// Finished with a provider-side error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl RunState {
    /// Whether the run has reached a state it will never leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed | RunState::Cancelled)
    }
}

/// Opaque identifier for a run owned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    /// Provider-assigned run identifier.
    pub id: String,
}

impl RunHandle {
    /// Wraps a provider-assigned run id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One step's output within a run: a raw value and an optional summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    /// The step's raw output value.
    #[serde(default)]
    pub value: Option<String>,
    /// A short human-readable summary of the value, when the provider made one.
    #[serde(default)]
    pub summary: Option<String>,
}

/// The loosely-typed output structure of a run.
///
/// Every field is optional on the wire; which ones are populated varies by
/// provider and by run. Insertion order of `step_outputs` follows the order
/// the provider executed the steps in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunPayload {
    /// Direct top-level result text, when the provider produced one.
    #[serde(default)]
    pub result: Option<String>,
    /// The plan's final output, when the run went through planning steps.
    #[serde(default)]
    pub final_output: Option<StepOutput>,
    /// Per-step outputs keyed by step name, in execution order.
    #[serde(default)]
    pub step_outputs: IndexMap<String, StepOutput>,
    /// Pending clarification requests, carried opaquely for the caller.
    #[serde(default)]
    pub clarifications: Vec<serde_json::Value>,
    /// Provider error detail for runs that ended in `Failed`.
    #[serde(default)]
    pub error: Option<String>,
}

/// Terminal snapshot of a run: its state and output payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The state the run ended in.
    pub state: RunState,
    /// The run's outputs. Defaulted when the provider returned none.
    #[serde(default)]
    pub payload: RunPayload,
}

/// Normalized result pulled out of a completed run.
///
/// Derived per request and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedResult {
    /// The user-facing answer text.
    pub text: String,
    /// Names of tools the run invoked, in execution order.
    pub tools_used: Vec<String>,
    /// The full payload the text was extracted from, for diagnostics.
    pub raw: serde_json::Value,
}

/// Classification of a failed provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rate limit or quota exhaustion; worth retrying after a backoff.
    RateLimited,
    /// Network or server hiccup; worth a limited retry.
    Transient,
    /// Explicit provider error; retrying will not help.
    Permanent,
    /// The run did not reach a terminal state in time.
    Timeout,
}

/// Telemetry record for one provider attempt. Logged, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    /// Name of the provider that was attempted.
    pub provider: String,
    /// Whether the attempt produced a completed run.
    pub success: bool,
    /// Failure classification for unsuccessful attempts.
    pub error_kind: Option<ErrorKind>,
    /// Wall-clock duration of the attempt.
    pub elapsed: Duration,
}
