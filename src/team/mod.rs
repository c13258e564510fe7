//! Multi-agent teams and speaker selection.

pub mod orchestrator;
pub mod selection;

pub use orchestrator::Team;
pub use selection::{
    LlmSelector, PatternSelector, RoundRobin, SelectionContext, SelectionState, SelectionStrategy,
    AGENT_NAME_PLACEHOLDER, DEFAULT_SELECTOR_PROMPT,
};
