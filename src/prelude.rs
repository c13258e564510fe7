//! Convenience re-exports for common use.

pub use crate::agent::{
    Agent, AgentDescriptor, AgentFactory, AgentRef, BehaviorKind, HookRegistry, SelectionMode,
    TeamDescriptor,
};
pub use crate::agent_loop::{AgentEvent, LoopSettings, Response, TerminationState, TurnLoop};
pub use crate::config::ParleyConfig;
pub use crate::error::{ParleyError, Result};
pub use crate::provider::{ModelProvider, ProviderRegistry, RoundEvent, RoundRequest};
pub use crate::tools::{FunctionTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{Message, MessageContent, ToolCall, ToolOutput, ToolResult};
