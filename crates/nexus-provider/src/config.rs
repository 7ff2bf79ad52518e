use serde::{Deserialize, Serialize};

/// The LLM providers the backend can route a query to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini.
    Gemini,
    /// Mistral AI.
    Mistral,
    /// OpenAI.
    OpenAi,
}

impl ProviderKind {
    /// Canonical lowercase name used in provider labels and preferences.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Default model for this provider when the config names none.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-1.5-pro",
            ProviderKind::Mistral => "mistral-small-latest",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }

    /// Default API base for direct (non-planner) calls to this provider.
    pub fn default_chat_base_url(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::Mistral => "https://api.mistral.ai",
            ProviderKind::OpenAi => "https://api.openai.com",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider configuration: which model to run and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which provider this config is for.
    pub kind: ProviderKind,
    /// Model identifier, e.g. `gemini-1.5-pro` or `mistral-small-latest`.
    pub model_id: String,
    /// API key for the provider. Empty means the provider is unavailable.
    pub api_key: String,
    /// Override for the provider's API base URL (used by tests).
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Response token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

impl ProviderConfig {
    /// Builds a config for `kind` with its default model.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            model_id: kind.default_model().to_string(),
            api_key: api_key.into(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    /// The base URL for direct API calls to this provider.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            self.kind.default_chat_base_url()
        }
    }

    /// Whether a credential is present for this provider.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Connection settings for the agent-planning platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Base URL of the planning platform.
    #[serde(default = "default_planner_base_url")]
    pub base_url: String,
    /// Platform API key, when the deployment requires one.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_planner_base_url() -> String {
    "http://127.0.0.1:9100".to_string()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: default_planner_base_url(),
            api_key: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
        let kind: ProviderKind = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(kind, ProviderKind::Gemini);
    }

    #[test]
    fn provider_config_defaults() {
        let config = ProviderConfig::new(ProviderKind::Mistral, "key");
        assert_eq!(config.model_id, "mistral-small-latest");
        assert_eq!(config.base_url(), "https://api.mistral.ai");
        assert!(config.has_credentials());
    }

    #[test]
    fn provider_config_base_url_override() {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi, "key");
        config.api_base_url = Some("http://localhost:8080".to_string());
        assert_eq!(config.base_url(), "http://localhost:8080");
    }

    #[test]
    fn empty_or_blank_key_means_no_credentials() {
        assert!(!ProviderConfig::new(ProviderKind::Gemini, "").has_credentials());
        assert!(!ProviderConfig::new(ProviderKind::Gemini, "   ").has_credentials());
    }

    #[test]
    fn provider_config_toml_defaults() {
        let toml_str = r#"
            kind = "mistral"
            model_id = "mistral-small-latest"
            api_key = "test-key"
        "#;
        let config: ProviderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 2048);
        assert!(config.api_base_url.is_none());
    }
}
