use std::collections::HashMap;

use anyhow::Result;
use strum_macros::{Display, EnumIter, EnumString};

use super::base::Provider;
use super::configs::ProviderConfig;
use super::groq::GroqProvider;
use crate::errors::AgentError;

/// Closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Groq,
    Cerebras,
}

pub fn create_provider(config: ProviderConfig) -> Result<Box<dyn Provider + Send + Sync>> {
    match config {
        ProviderConfig::Groq(groq_config) => Ok(Box::new(GroqProvider::new(groq_config))),
        // Cerebras is recognized but not wired up yet
        ProviderConfig::Cerebras(_) => Err(AgentError::ProviderUnavailable(
            "cerebras support is not yet implemented".to_string(),
        )
        .into()),
    }
}

/// Holds the configured providers for one run, keyed by identifier.
/// Exactly one is taken as the active provider; the rest only exist so
/// that selection failures are reported per-provider, not at startup.
pub struct ProviderRegistry {
    providers: HashMap<ProviderType, Box<dyn Provider + Send + Sync>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: ProviderType, provider: Box<dyn Provider + Send + Sync>) {
        self.providers.insert(kind, provider);
    }

    pub fn contains(&self, kind: ProviderType) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Initialize every registered provider, dropping the ones whose
    /// client cannot be prepared.
    pub async fn initialize_all(&mut self) {
        let mut unusable = Vec::new();
        for (kind, provider) in self.providers.iter_mut() {
            if !provider.initialize().await {
                tracing::error!(provider = %kind, "failed to initialize provider");
                unusable.push(*kind);
            }
        }
        for kind in unusable {
            self.providers.remove(&kind);
        }
    }

    /// Hand the active provider to the caller. Selecting a provider that
    /// was never configured (e.g. missing credential) is an error here,
    /// not at registration time.
    pub fn take(
        &mut self,
        kind: ProviderType,
    ) -> Result<Box<dyn Provider + Send + Sync>, AgentError> {
        self.providers
            .remove(&kind)
            .ok_or_else(|| AgentError::ProviderUnavailable(kind.to_string()))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
