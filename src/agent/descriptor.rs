//! Declarative agent and team descriptions consumed by the factory.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ParleyError;

/// Immutable description of one agent.
///
/// `max_iterations` and `termination_phrase` are optional; the factory fills
/// them from [`ParleyConfig`](crate::config::ParleyConfig) when omitted.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct AgentDescriptor {
    #[builder(into)]
    pub name: String,
    #[builder(into, default)]
    #[serde(default)]
    pub description: String,
    #[builder(into, default)]
    #[serde(default)]
    pub instructions: String,
    #[builder(default)]
    #[serde(default)]
    pub tools: Vec<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_phrase: Option<String>,
    /// Dynamic initialization hook, as `module.function`.
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_hook: Option<String>,
    #[serde(flatten)]
    pub kind: BehaviorKind,
}

impl AgentDescriptor {
    /// Parse a descriptor from JSON; malformed input is a construction error.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ParleyError> {
        serde_json::from_value(value)
            .map_err(|e| ParleyError::construction(format!("invalid agent descriptor: {e}")))
    }

    pub fn team(&self) -> Option<&TeamDescriptor> {
        match &self.kind {
            BehaviorKind::Team(team) => Some(team),
            _ => None,
        }
    }
}

/// Which loop variant drives an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorKind {
    /// One model round per call.
    Assistant,
    /// Iterates until the termination phrase or the iteration cap.
    Looping,
    /// Runs fenced code blocks with the named executor.
    CodeExecutor { executor: String },
    /// A nested team of sub-agents.
    Team(TeamDescriptor),
    /// Iterative agent whose init hook is mandatory.
    DynamicInit,
}

impl BehaviorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Looping => "looping",
            Self::CodeExecutor { .. } => "code_executor",
            Self::Team(_) => "team",
            Self::DynamicInit => "dynamic_init",
        }
    }
}

/// How a team picks its next speaker.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    RoundRobin,
    Selector,
}

/// Team-specific fields. Name, description and termination phrase come from
/// the enclosing [`AgentDescriptor`].
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct TeamDescriptor {
    pub agents: Vec<AgentDescriptor>,
    #[builder(default)]
    #[serde(default)]
    pub selection: SelectionMode,
    /// Prompt for LLM selection; placeholders `{roles}`, `{participants}`, `{history}`.
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_prompt: Option<String>,
    /// Deterministic template containing `{agent_name}`.
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_pattern: Option<String>,
    #[builder(into)]
    pub orchestrator: String,
    #[builder(default)]
    #[serde(default)]
    pub include_inner_dialog: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn team_descriptor_parses_from_flat_json() {
        let descriptor = AgentDescriptor::from_value(json!({
            "name": "research",
            "kind": "team",
            "orchestrator": "manager",
            "selection": "selector",
            "selection_pattern": "NEXT AGENT: {agent_name}",
            "agents": [
                { "name": "manager", "kind": "looping" },
                { "name": "runner", "kind": "code_executor", "executor": "local" }
            ]
        }))
        .unwrap();

        let team = descriptor.team().unwrap();
        assert_eq!(team.selection, SelectionMode::Selector);
        assert_eq!(team.orchestrator, "manager");
        assert_eq!(team.agents.len(), 2);
        assert_eq!(
            team.agents[1].kind,
            BehaviorKind::CodeExecutor {
                executor: "local".into()
            }
        );
        assert_eq!(team.max_messages, None);
        assert!(!team.include_inner_dialog);
    }

    #[test]
    fn unknown_kind_is_a_construction_error() {
        let err = AgentDescriptor::from_value(json!({ "name": "x", "kind": "telepath" })).unwrap_err();
        assert!(matches!(err, ParleyError::Construction(_)));
    }

    #[test]
    fn builder_leaves_defaults_unset() {
        let descriptor = AgentDescriptor::builder()
            .name("writer")
            .instructions("Write things.")
            .kind(BehaviorKind::Assistant)
            .build();
        assert_eq!(descriptor.max_iterations, None);
        assert!(descriptor.tools.is_empty());
        assert_eq!("round_robin", SelectionMode::RoundRobin.to_string());
    }
}
