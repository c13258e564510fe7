//! Model/tool-execution provider contract.
//!
//! A provider runs one round for an agent: it talks to a language model,
//! executes any tool calls the model makes, and reports what happened as a
//! stream of [`RoundEvent`]s. How it does that is up to the implementation.

pub mod registry;

pub use registry::ProviderRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ParleyError;
use crate::tools::Tool;
use crate::types::{Attachment, Message, ToolResult};

/// Input for a single model/tool round.
#[derive(Clone)]
pub struct RoundRequest {
    /// Name of the agent driving the round.
    pub agent: String,
    pub instructions: String,
    /// Full accumulated history, oldest first.
    pub history: Vec<Message>,
    /// Media produced by tools in the previous round.
    pub attachments: Vec<Attachment>,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl RoundRequest {
    pub fn new(agent: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            agent: agent.into(),
            instructions: String::new(),
            history,
            attachments: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }
}

impl std::fmt::Debug for RoundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundRequest")
            .field("agent", &self.agent)
            .field("history", &self.history.len())
            .field("attachments", &self.attachments.len())
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Event produced while a round executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    /// Streaming text fragment from the model.
    TextDelta { text: String },
    /// The model asked for tools to run.
    ToolCallRequest { message: Message },
    /// Results of the requested tools, in execution order.
    ToolCallResult { results: Vec<ToolResult> },
    /// The agent's final message for this round.
    RoundResult { message: Message },
}

/// Core trait implemented by model/tool-execution backends.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "scripted").
    fn provider_name(&self) -> &str;

    /// Run one round and stream its events.
    async fn stream_round(
        &self,
        request: RoundRequest,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<RoundEvent, ParleyError>>, ParleyError>;
}
