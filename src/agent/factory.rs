//! Builds agents from descriptors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{
    Agent, AgentDescriptor, AgentRef, AssistantAgent, BehaviorKind, CodeExecutor, CodeExecutorAgent,
    ContextScoped, HookRegistry, LocalCommandExecutor, SelectionMode, TeamDescriptor,
};
use crate::agent_loop::{LoopMode, LoopSettings};
use crate::config::ParleyConfig;
use crate::context;
use crate::error::ParleyError;
use crate::provider::ProviderRegistry;
use crate::team::{LlmSelector, PatternSelector, RoundRobin, SelectionStrategy, Team};
use crate::tools::ToolRegistry;

/// Executor subtype always available to code-executor agents.
pub const LOCAL_EXECUTOR: &str = "local";

/// Turns [`AgentDescriptor`]s into runnable agents.
///
/// Dispatches on [`BehaviorKind`]; team kinds build their members
/// recursively and wrap each in [`ContextScoped`]. Omitted descriptor fields
/// take their values from the factory's [`ParleyConfig`].
pub struct AgentFactory {
    config: ParleyConfig,
    models: ProviderRegistry,
    tools: ToolRegistry,
    hooks: HookRegistry,
    executors: HashMap<String, Arc<dyn CodeExecutor>>,
}

impl AgentFactory {
    pub fn new(models: ProviderRegistry) -> Self {
        Self {
            config: ParleyConfig::default(),
            models,
            tools: ToolRegistry::new(),
            hooks: HookRegistry::new(),
            executors: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: ParleyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Register an executor subtype; overrides the built-in `local` one when
    /// registered under that name.
    pub fn with_executor(mut self, name: impl Into<String>, executor: Arc<dyn CodeExecutor>) -> Self {
        self.executors.insert(name.into(), executor);
        self
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Build an agent. Construction problems are reported as
    /// [`ParleyError::Construction`]; init hook failures are logged and do
    /// not fail the build.
    pub fn build(&self, descriptor: &AgentDescriptor) -> Result<AgentRef, ParleyError> {
        let mut descriptor = descriptor.clone();
        self.config.apply_defaults(&mut descriptor);
        self.build_resolved(&descriptor)
    }

    fn build_resolved(&self, descriptor: &AgentDescriptor) -> Result<AgentRef, ParleyError> {
        if descriptor.name.trim().is_empty() {
            return Err(ParleyError::construction("agent name must not be empty"));
        }
        tracing::debug!(agent = %descriptor.name, kind = descriptor.kind.label(), "building agent");

        let agent: AgentRef = match &descriptor.kind {
            BehaviorKind::Assistant => Arc::new(self.assistant(descriptor, LoopMode::SingleRound)?),
            BehaviorKind::Looping => Arc::new(self.assistant(descriptor, LoopMode::Iterative)?),
            BehaviorKind::DynamicInit => {
                if descriptor.init_hook.is_none() {
                    return Err(ParleyError::construction(format!(
                        "dynamic-init agent '{}' has no init_hook",
                        descriptor.name
                    )));
                }
                Arc::new(self.assistant(descriptor, LoopMode::Iterative)?)
            }
            BehaviorKind::CodeExecutor { executor } => {
                self.tools.resolve_all(&descriptor.tools)?;
                let executor = self.executor(executor)?;
                Arc::new(
                    CodeExecutorAgent::new(&descriptor.name, &descriptor.description, executor)
                        .with_instructions(&descriptor.instructions),
                )
            }
            BehaviorKind::Team(team) => Arc::new(self.team(descriptor, team)?),
        };

        if let Some(hook) = &descriptor.init_hook {
            self.run_init_hook(hook, &agent);
        }
        Ok(agent)
    }

    fn assistant(&self, descriptor: &AgentDescriptor, mode: LoopMode) -> Result<AssistantAgent, ParleyError> {
        let provider = self.models.resolve(descriptor.model.as_deref())?;
        let tools = self.tools.resolve_all(&descriptor.tools)?;
        let mut settings = LoopSettings::from_config(&self.config)
            .with_max_iterations(descriptor.max_iterations.unwrap_or(self.config.max_iterations))
            .with_termination_phrase(
                descriptor
                    .termination_phrase
                    .clone()
                    .unwrap_or_else(|| self.config.termination_phrase.clone()),
            );
        if mode == LoopMode::SingleRound {
            settings = settings.single_round();
        }
        Ok(AssistantAgent::new(&descriptor.name, &descriptor.description, provider)
            .with_instructions(&descriptor.instructions)
            .with_tools(tools)
            .with_settings(settings))
    }

    fn executor(&self, subtype: &str) -> Result<Arc<dyn CodeExecutor>, ParleyError> {
        if let Some(executor) = self.executors.get(subtype) {
            return Ok(executor.clone());
        }
        if subtype == LOCAL_EXECUTOR {
            return Ok(Arc::new(
                LocalCommandExecutor::new().with_timeout(self.config.code_timeout()),
            ));
        }
        Err(ParleyError::construction(format!(
            "unsupported code executor subtype '{subtype}'"
        )))
    }

    fn team(&self, descriptor: &AgentDescriptor, team: &TeamDescriptor) -> Result<Team, ParleyError> {
        if team.agents.is_empty() {
            return Err(ParleyError::construction(format!(
                "team '{}' has no agents",
                descriptor.name
            )));
        }
        let mut names = HashSet::new();
        for member in &team.agents {
            if !names.insert(member.name.as_str()) {
                return Err(ParleyError::construction(format!(
                    "team '{}' has more than one agent named '{}'",
                    descriptor.name, member.name
                )));
            }
        }
        let Some(orchestrator) = team.agents.iter().find(|a| a.name == team.orchestrator) else {
            return Err(ParleyError::construction(format!(
                "orchestrator '{}' is not a member of team '{}'",
                team.orchestrator, descriptor.name
            )));
        };

        let pattern = team
            .selection_pattern
            .as_deref()
            .map(|template| PatternSelector::compile(template, &team.orchestrator))
            .transpose()?;
        let strategy: Box<dyn SelectionStrategy> = match (team.selection, pattern) {
            (SelectionMode::RoundRobin, _) => Box::new(RoundRobin),
            (SelectionMode::Selector, Some(pattern)) => Box::new(pattern),
            (SelectionMode::Selector, None) => {
                let provider = self.models.resolve(orchestrator.model.as_deref())?;
                let mut selector = LlmSelector::new(&team.orchestrator, provider);
                if let Some(prompt) = &team.selector_prompt {
                    selector = selector.with_prompt(prompt);
                }
                Box::new(selector)
            }
        };

        let members = team
            .agents
            .iter()
            .map(|member| {
                self.build_resolved(member)
                    .map(|agent| Arc::new(ContextScoped::new(agent)) as AgentRef)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let built = Team::new(&descriptor.name, members, strategy)
            .with_description(&descriptor.description)
            .with_termination_phrase(
                descriptor
                    .termination_phrase
                    .clone()
                    .unwrap_or_else(|| self.config.termination_phrase.clone()),
            )
            .with_max_messages(team.max_messages.unwrap_or(self.config.team_max_messages))
            .with_inner_dialog(team.include_inner_dialog);
        built.set_instructions(descriptor.instructions.clone());
        Ok(built)
    }

    fn run_init_hook(&self, identifier: &str, agent: &AgentRef) {
        let hook = match self.hooks.resolve(identifier) {
            Ok(hook) => hook,
            Err(err) => {
                tracing::error!(agent = %agent.name(), hook = identifier, error = %err, "init hook could not be resolved");
                return;
            }
        };
        if let Err(err) = context::bind_sync(agent.clone(), || hook()) {
            tracing::error!(agent = %agent.name(), hook = identifier, error = %err, "init hook failed");
        }
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("config", &self.config)
            .field("models", &self.models)
            .field("tools", &self.tools.names())
            .field("hooks", &self.hooks)
            .field("executors", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}
