//! Provider clients, fallback orchestration, and result extraction.
//!
//! This crate holds the reusable query-execution core: a uniform
//! [`ProviderClient`] interface over the configured LLM providers, the
//! [`FallbackOrchestrator`] that drives them in priority order with
//! retry/backoff, the extractor that normalizes a run's loosely-typed
//! output, and the [`QueryService`] façade request handlers call.

/// Provider client implementations and the capability trait.
pub mod backends;
/// Provider and planner configuration types.
pub mod config;
/// Result extraction from run payloads.
pub mod extract;
/// Retry and fallback orchestration.
pub mod failover;
/// The process-wide provider registry.
pub mod registry;
/// The query-handling façade.
pub mod service;
/// The tool registry.
pub mod tools;

pub use backends::chat::DirectChatClient;
pub use backends::planner::PlannerClient;
pub use backends::{ProviderClient, DEFAULT_RUN_TIMEOUT};
pub use config::{PlannerConfig, ProviderConfig, ProviderKind};
pub use extract::{extract, FINAL_RESULT_KEY};
pub use failover::{classify, FallbackOrchestrator, Resolution, RetryPolicy};
pub use registry::{ProviderDescriptor, ProviderRegistry, ProviderRegistryBuilder};
pub use service::{QueryOutcome, QueryService};
pub use tools::{ToolInfo, ToolRegistry, ToolRegistryView, ToolSource, DEFAULT_REGISTRY_TIMEOUT};
