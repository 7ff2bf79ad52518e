//! Core types and error definitions for the Nexus backend.
//!
//! This crate provides the foundational types shared across all Nexus crates:
//! the unified error enum, run lifecycle types, and the normalized result
//! extracted from a provider run.
//!
//! # Main types
//!
//! - [`NexusError`] — Unified error enum for all Nexus subsystems.
//! - [`NexusResult`] — Convenience alias for `Result<T, NexusError>`.
//! - [`RunState`] — Lifecycle state of a provider-side run.
//! - [`RunOutcome`] — Terminal state plus the run's output payload.
//! - [`ExtractedResult`] — Normalized text + tool usage pulled from a run.

/// Run lifecycle, payload, and attempt-telemetry types.
pub mod run;

pub use run::{
    AttemptOutcome, ErrorKind, ExtractedResult, RunHandle, RunOutcome, RunPayload, RunState,
    StepOutput,
};

/// Top-level error type for the Nexus backend.
///
/// Variants cover both subsystems (HTTP, config, gateway) and the
/// query-pipeline failure taxonomy (unavailable provider, empty query,
/// extraction failure, run timeout).
#[derive(Debug, thiserror::Error)]
pub enum NexusError {
    /// The named provider has no credentials or failed to initialize.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The query was empty or whitespace-only; no provider was contacted.
    #[error("Query cannot be empty")]
    EmptyQuery,

    /// The run completed but no usable text could be extracted from it.
    #[error("No extractable text in run output: {0}")]
    Extraction(String),

    /// A run did not reach a terminal state before the timeout elapsed.
    #[error("Run timed out: {0}")]
    RunTimeout(String),

    /// An error reported by a provider or the planning platform.
    #[error("Provider error: {0}")]
    Provider(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the API gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`NexusError`].
pub type NexusResult<T> = Result<T, NexusError>;
