//! Dynamic initialization hooks, registered under `module.function`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ParleyError;

/// A zero-argument hook run right after an agent is built. Hooks reach the
/// new agent through [`context::current`](crate::context::current).
pub type HookFn = Arc<dyn Fn() -> Result<(), ParleyError> + Send + Sync>;

#[derive(Default, Clone)]
pub struct HookRegistry {
    modules: HashMap<String, HashMap<String, HookFn>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, module: impl Into<String>, function: impl Into<String>, hook: F)
    where
        F: Fn() -> Result<(), ParleyError> + Send + Sync + 'static,
    {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(function.into(), Arc::new(hook));
    }

    pub fn with_hook<F>(mut self, module: impl Into<String>, function: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Result<(), ParleyError> + Send + Sync + 'static,
    {
        self.register(module, function, hook);
        self
    }

    /// Resolve a `module.function` identifier. The module part may itself
    /// contain dots; the function is everything after the last one.
    pub fn resolve(&self, identifier: &str) -> Result<HookFn, ParleyError> {
        let (module, function) = identifier.rsplit_once('.').ok_or_else(|| {
            ParleyError::InvalidArgument(format!(
                "hook '{identifier}' is not of the form module.function"
            ))
        })?;
        let functions = self
            .modules
            .get(module)
            .ok_or_else(|| ParleyError::InvalidArgument(format!("hook module '{module}' not found")))?;
        functions.get(function).cloned().ok_or_else(|| {
            ParleyError::InvalidArgument(format!(
                "hook function '{function}' not found in module '{module}'"
            ))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self
            .modules
            .iter()
            .flat_map(|(module, functions)| functions.keys().map(move |f| format!("{module}.{f}")))
            .collect();
        names.sort();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}
