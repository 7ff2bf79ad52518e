//! The process-wide, priority-ordered provider list.

use crate::backends::ProviderClient;
use std::sync::Arc;

/// One configured provider: its name, priority, and client.
#[derive(Clone)]
pub struct ProviderDescriptor {
    /// Stable provider name, e.g. `gemini` or `mistral-direct`.
    pub name: String,
    /// Position in the fallback chain; lower tries first.
    pub priority: u32,
    /// The client used to execute runs on this provider.
    pub client: Arc<dyn ProviderClient>,
}

/// Immutable, priority-ordered list of the providers configured at startup.
///
/// Built once by the binary and shared read-only across requests; the
/// orchestrator never mutates it. A provider that failed to initialize is
/// simply absent for the process lifetime.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Starts building a registry. Providers keep registration order.
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder {
            clients: Vec::new(),
        }
    }

    /// Descriptors in priority order.
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Looks a provider up by name.
    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Provider names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Clients in priority order, for handing to the orchestrator.
    pub fn clients(&self) -> Vec<Arc<dyn ProviderClient>> {
        self.providers.iter().map(|p| p.client.clone()).collect()
    }

    /// Number of configured providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider at all was configured.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Builder for [`ProviderRegistry`]; registration order becomes priority.
pub struct ProviderRegistryBuilder {
    clients: Vec<Arc<dyn ProviderClient>>,
}

impl ProviderRegistryBuilder {
    /// Appends a provider at the next priority slot.
    pub fn register(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.push(client);
        self
    }

    /// Finalizes the immutable registry.
    pub fn build(self) -> ProviderRegistry {
        let providers = self
            .clients
            .into_iter()
            .enumerate()
            .map(|(i, client)| ProviderDescriptor {
                name: client.name().to_string(),
                priority: i as u32,
                client,
            })
            .collect();
        ProviderRegistry { providers }
    }
}
