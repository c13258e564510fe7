//! Named model bindings resolved at agent construction time.

use std::collections::HashMap;
use std::sync::Arc;

use super::ModelProvider;
use crate::error::ParleyError;

/// Registry mapping model names to providers, with a default binding.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
    default: Option<Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose only binding is `provider`, used for every agent.
    pub fn with_default(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            providers: HashMap::new(),
            default: Some(provider),
        }
    }

    /// Register a provider under a model name.
    pub fn register(&mut self, model: impl Into<String>, provider: Arc<dyn ModelProvider>) {
        self.providers.insert(model.into(), provider);
    }

    pub fn set_default(&mut self, provider: Arc<dyn ModelProvider>) {
        self.default = Some(provider);
    }

    /// Resolve a model name, falling back to the default when none is given.
    pub fn resolve(&self, model: Option<&str>) -> Result<Arc<dyn ModelProvider>, ParleyError> {
        match model {
            Some(name) => self.providers.get(name).cloned().ok_or_else(|| {
                ParleyError::construction(format!("no model binding registered for '{name}'"))
            }),
            None => self.default.clone().ok_or_else(|| {
                ParleyError::construction("no default model binding configured")
            }),
        }
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.providers.contains_key(model)
    }

    /// List all registered model names.
    pub fn model_names(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("models", &self.model_names())
            .field("default", &self.default.as_ref().map(|p| p.provider_name().to_string()))
            .finish()
    }
}
