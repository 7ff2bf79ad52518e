//! The `nexus` binary: configuration loading, provider initialization, and
//! gateway startup.

use clap::{Parser, Subcommand};
use nexus_gateway::{AppState, GatewayServer, GithubClient, GithubOauthConfig, ProviderStatus};
use nexus_provider::{
    DirectChatClient, PlannerClient, PlannerConfig, ProviderConfig, ProviderKind,
    ProviderRegistry, QueryService, RetryPolicy, ToolRegistry, DEFAULT_REGISTRY_TIMEOUT,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nexus", about = "Nexus — multi-provider AI query backend")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "nexus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage tools
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List configured tools
    List,
}

#[derive(Deserialize)]
struct NexusConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    cors: CorsConfig,
    #[serde(default)]
    planner: PlannerConfig,
    #[serde(default)]
    providers: ProvidersConfig,
    #[serde(default)]
    retry: RetryPolicy,
    #[serde(default)]
    github: GithubFileConfig,
    #[serde(default = "default_environment")]
    environment: String,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            planner: PlannerConfig::default(),
            providers: ProvidersConfig::default(),
            retry: RetryPolicy::default(),
            github: GithubFileConfig::default(),
            environment: default_environment(),
        }
    }
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize)]
struct CorsConfig {
    #[serde(default = "default_origins")]
    allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_origins(),
        }
    }
}

#[derive(Deserialize)]
struct ProvidersConfig {
    #[serde(default = "default_gemini_model")]
    gemini_model: String,
    #[serde(default = "default_mistral_model")]
    mistral_model: String,
    #[serde(default = "default_openai_model")]
    openai_model: String,
    /// Per-provider ceiling on how long a run may take, in seconds.
    #[serde(default = "default_run_timeout_secs")]
    run_timeout_secs: u64,
    /// Whether to append the direct Mistral chat call as the final fallback.
    #[serde(default = "default_true")]
    direct_fallback: bool,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini_model: default_gemini_model(),
            mistral_model: default_mistral_model(),
            openai_model: default_openai_model(),
            run_timeout_secs: default_run_timeout_secs(),
            direct_fallback: true,
        }
    }
}

#[derive(Deserialize, Default)]
struct GithubFileConfig {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
}

fn default_environment() -> String {
    "development".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
    ]
}
fn default_gemini_model() -> String {
    ProviderKind::Gemini.default_model().to_string()
}
fn default_mistral_model() -> String {
    ProviderKind::Mistral.default_model().to_string()
}
fn default_openai_model() -> String {
    ProviderKind::OpenAi.default_model().to_string()
}
fn default_run_timeout_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builds the fallback chain from config and environment.
///
/// A provider whose API key is absent stays out of the chain for the whole
/// process lifetime; the status snapshot still records it for health checks.
fn build_providers(config: &NexusConfig) -> (ProviderRegistry, Vec<ProviderStatus>) {
    let kinds = [
        (ProviderKind::Gemini, "GOOGLE_API_KEY", &config.providers.gemini_model),
        (ProviderKind::Mistral, "MISTRAL_API_KEY", &config.providers.mistral_model),
        (ProviderKind::OpenAi, "OPENAI_API_KEY", &config.providers.openai_model),
    ];

    let mut builder = ProviderRegistry::builder();
    let mut status = Vec::new();

    for (kind, key_var, model) in kinds {
        match env_key(key_var) {
            Some(key) => {
                let mut provider = ProviderConfig::new(kind, key);
                provider.model_id = model.clone();
                builder = builder.register(Arc::new(PlannerClient::new(
                    provider,
                    config.planner.clone(),
                )));
                status.push(ProviderStatus {
                    name: kind.as_str().to_string(),
                    available: true,
                    model: Some(model.clone()),
                });
                info!(provider = kind.as_str(), %model, "Provider configured");
            }
            None => {
                status.push(ProviderStatus {
                    name: kind.as_str().to_string(),
                    available: false,
                    model: None,
                });
                warn!(provider = kind.as_str(), key = key_var, "API key not found, provider skipped");
            }
        }
    }

    // Direct chat call as the last link in the chain.
    if config.providers.direct_fallback {
        if let Some(key) = env_key("MISTRAL_API_KEY") {
            let mut provider = ProviderConfig::new(ProviderKind::Mistral, key);
            provider.model_id = config.providers.mistral_model.clone();
            builder = builder.register(Arc::new(DirectChatClient::new(
                "mistral-direct",
                provider,
            )));
            status.push(ProviderStatus {
                name: "mistral-direct".to_string(),
                available: true,
                model: Some(config.providers.mistral_model.clone()),
            });
            info!("Direct Mistral fallback configured");
        }
    }

    (builder.build(), status)
}

fn resolve_github(config: &GithubFileConfig) -> Option<GithubOauthConfig> {
    let client_id = config.client_id.clone().or_else(|| env_key("GITHUB_CLIENT_ID"))?;
    let client_secret = config
        .client_secret
        .clone()
        .or_else(|| env_key("GITHUB_CLIENT_SECRET"))?;

    Some(GithubOauthConfig {
        client_id,
        client_secret,
        oauth_base_url: "https://github.com".to_string(),
        api_base_url: "https://api.github.com".to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config: NexusConfig = match tokio::fs::read_to_string(&cli.config).await {
        Ok(raw) => toml::from_str(&raw).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", cli.config.display(), e)
        })?,
        Err(_) => {
            info!(path = %cli.config.display(), "Config file not found, using defaults");
            NexusConfig::default()
        }
    };

    let environment = env_key("ENVIRONMENT").unwrap_or_else(|| config.environment.clone());

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            info!(%host, port, %environment, "Starting Nexus gateway");

            let (registry, provider_status) = build_providers(&config);
            if registry.is_empty() {
                warn!("No AI providers available! Check your API keys.");
            } else {
                info!(providers = ?registry.names(), "Fallback chain ready");
            }

            let service = Arc::new(
                QueryService::new(Arc::new(registry))
                    .with_policy(config.retry.clone())
                    .with_run_timeout(Duration::from_secs(config.providers.run_timeout_secs)),
            );

            let tools = Arc::new(
                ToolRegistry::load(Some(config.planner.clone()), DEFAULT_REGISTRY_TIMEOUT)
                    .await,
            );
            info!(count = tools.len(), "Tool registry ready");

            let github = resolve_github(&config.github)
                .map(|c| Arc::new(GithubClient::new(c)));
            if github.is_some() {
                info!("GitHub OAuth configured");
            }

            let state = Arc::new(AppState {
                service,
                tools,
                github,
                provider_status,
                environment,
            });

            let app = GatewayServer::build(state, &config.cors.allowed_origins);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Nexus gateway listening on {addr}");
            axum::serve(listener, app).await?;
        }
        Commands::Tools { action } => match action {
            ToolsAction::List => {
                let tools =
                    ToolRegistry::load(Some(config.planner.clone()), DEFAULT_REGISTRY_TIMEOUT)
                        .await;

                if tools.is_empty() {
                    println!("No tools configured.");
                } else {
                    println!("Configured tools:");
                    for tool in tools.tools() {
                        println!("  {} [{}] — {}", tool.name, tool.category, tool.description);
                    }
                    println!("\nTotal: {} tool(s)", tools.len());
                }
            }
        },
    }

    Ok(())
}
