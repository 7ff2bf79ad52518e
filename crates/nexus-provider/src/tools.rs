//! Static enumeration of the tools available to provider runs.
//!
//! The registry is assembled once at startup: a built-in set seeded
//! immediately, optionally merged with whatever the planning platform
//! advertises. The remote fetch is bounded by a fixed timeout so a slow
//! platform cannot block the process from becoming ready; past the deadline
//! the fetch is abandoned, not cancelled, and its result discarded.

use crate::config::PlannerConfig;
use nexus_core::{NexusError, NexusResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// How long the remote registry fetch may take before it is abandoned.
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(15);

/// Where a tool definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    /// Shipped with the backend.
    Builtin,
    /// Advertised by the planning platform at startup.
    Remote,
}

/// One tool a provider run may invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Stable identifier.
    pub id: String,
    /// Tool name as it appears in run step outputs.
    pub name: String,
    /// Short human-readable description.
    pub description: String,
    /// Keyword-derived category for display grouping.
    pub category: String,
    /// Origin of the definition.
    pub source: ToolSource,
}

/// Grouping of tools by source registry, for the registries endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRegistryView {
    /// Registry name (`builtin` or `remote`).
    pub registry_name: String,
    /// Number of tools in this registry.
    pub total_tools: usize,
    /// The tools themselves.
    pub tools: Vec<ToolInfo>,
}

/// Buckets a tool into a display category by name keywords.
pub fn categorize(name: &str) -> &'static str {
    let name = name.to_lowercase();
    if name.contains("search") || name.contains("web") || name.contains("crawl") {
        "Search & Web"
    } else if name.contains("calendar")
        || name.contains("gmail")
        || name.contains("slack")
        || name.contains("docs")
    {
        "Productivity"
    } else if name.contains("weather") || name.contains("map") {
        "Information"
    } else if name.contains("file") || name.contains("document") || name.contains("pdf") {
        "File Management"
    } else if name.contains("calculator") || name.contains("math") {
        "Calculation"
    } else if name.contains("image") || name.contains("vision") {
        "Image & Vision"
    } else {
        "Utility"
    }
}

fn builtin_tool(name: &str, description: &str) -> ToolInfo {
    ToolInfo {
        id: name.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: categorize(name).to_string(),
        source: ToolSource::Builtin,
    }
}

#[derive(Debug, Deserialize)]
struct RemoteTool {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteToolList {
    #[serde(default)]
    tools: Vec<RemoteTool>,
}

/// Immutable snapshot of the configured tools.
pub struct ToolRegistry {
    tools: Vec<ToolInfo>,
}

impl ToolRegistry {
    /// The built-in tool set, available without any platform connection.
    pub fn builtin() -> Self {
        let tools = vec![
            builtin_tool("calculator", "Perform mathematical calculations"),
            builtin_tool("web_search", "Search the internet for information"),
            builtin_tool("crawl", "Crawl a website and collect its pages"),
            builtin_tool("extract", "Extract structured content from a web page"),
            builtin_tool("weather", "Get current weather for a location"),
            builtin_tool("file_reader", "Read files from the workspace"),
            builtin_tool("file_writer", "Write files to the workspace"),
            builtin_tool("image_understanding", "Answer questions about an image"),
            builtin_tool("llm", "Run a raw LLM completion as a step"),
        ];
        Self { tools }
    }

    /// Builds the registry: built-ins plus, when a platform is configured,
    /// the remote tools it advertises within `fetch_timeout`.
    ///
    /// Remote tools whose names collide with an existing entry are skipped.
    pub async fn load(planner: Option<PlannerConfig>, fetch_timeout: Duration) -> Self {
        let mut registry = Self::builtin();

        let Some(planner) = planner else {
            return registry;
        };

        let fetch = tokio::spawn(fetch_remote_tools(planner));
        match tokio::time::timeout(fetch_timeout, fetch).await {
            Ok(Ok(Ok(remote))) => {
                let mut added = 0usize;
                for tool in remote {
                    if registry.tools.iter().any(|t| t.name == tool.name) {
                        continue;
                    }
                    registry.tools.push(tool);
                    added += 1;
                }
                info!(added, total = registry.tools.len(), "Remote tools merged");
            }
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Remote tool registry fetch failed, continuing with builtins");
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Remote tool registry task panicked, continuing with builtins");
            }
            Err(_) => {
                // The task keeps running detached; only its result is dropped.
                warn!(
                    timeout = ?fetch_timeout,
                    "Remote tool registry fetch abandoned, continuing with builtins"
                );
            }
        }

        registry
    }

    /// All tools, built-ins first.
    pub fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    /// Tool names in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of tools from the given source.
    pub fn count_by_source(&self, source: ToolSource) -> usize {
        self.tools.iter().filter(|t| t.source == source).count()
    }

    /// Total number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools grouped by source registry.
    pub fn registries(&self) -> Vec<ToolRegistryView> {
        [ToolSource::Builtin, ToolSource::Remote]
            .into_iter()
            .filter_map(|source| {
                let tools: Vec<ToolInfo> = self
                    .tools
                    .iter()
                    .filter(|t| t.source == source)
                    .cloned()
                    .collect();
                if tools.is_empty() {
                    return None;
                }
                Some(ToolRegistryView {
                    registry_name: match source {
                        ToolSource::Builtin => "builtin".to_string(),
                        ToolSource::Remote => "remote".to_string(),
                    },
                    total_tools: tools.len(),
                    tools,
                })
            })
            .collect()
    }
}

async fn fetch_remote_tools(planner: PlannerConfig) -> NexusResult<Vec<ToolInfo>> {
    let url = format!("{}/v1/tools", planner.base_url);
    let mut request = reqwest::Client::new().get(&url);
    if let Some(key) = &planner.api_key {
        request = request.header("Authorization", format!("Bearer {key}"));
    }

    let resp = request
        .send()
        .await
        .map_err(|e| NexusError::Http(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(NexusError::Provider(format!(
            "tool registry error {status}"
        )));
    }

    let list: RemoteToolList = resp
        .json()
        .await
        .map_err(|e| NexusError::Http(e.to_string()))?;

    Ok(list
        .tools
        .into_iter()
        .map(|t| ToolInfo {
            id: t.id.unwrap_or_else(|| t.name.clone()),
            category: categorize(&t.name).to_string(),
            description: t
                .description
                .unwrap_or_else(|| "No description available".to_string()),
            name: t.name,
            source: ToolSource::Remote,
        })
        .collect())
}
