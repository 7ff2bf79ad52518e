//! HTTP surface of the Nexus backend.
//!
//! Thin I/O glue over the query service: request parsing, response shaping,
//! CORS, and the GitHub OAuth pass-through. All orchestration lives in
//! `nexus-provider`.

/// GitHub OAuth token exchange and API pass-through.
pub mod github;
/// Router construction and request handlers.
pub mod server;

pub use github::{GithubClient, GithubOauthConfig};
pub use server::{AppState, GatewayServer, ProviderStatus};
