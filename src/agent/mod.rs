//! Agents: anything that answers a conversation with messages.

pub mod assistant;
pub mod code_executor;
pub mod descriptor;
pub mod factory;
pub mod hooks;
pub mod scoped;

pub use assistant::AssistantAgent;
pub use code_executor::{CodeBlock, CodeExecutor, CodeExecutorAgent, CodeResult, LocalCommandExecutor};
pub use descriptor::{AgentDescriptor, BehaviorKind, SelectionMode, TeamDescriptor};
pub use factory::AgentFactory;
pub use hooks::{HookFn, HookRegistry};
pub use scoped::ContextScoped;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::agent_loop::{AgentEvent, EventStream, Response};
use crate::error::ParleyError;
use crate::types::Message;

/// Shared handle to an agent.
pub type AgentRef = Arc<dyn Agent>;

/// Core agent trait.
///
/// Agents are driven through [`Agent::on_messages_stream`]; the aggregated
/// [`Agent::on_messages`] is derived from it.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name, unique within a team.
    fn name(&self) -> &str;

    /// Human-readable description used by LLM-driven speaker selection.
    fn description(&self) -> &str;

    /// Current system instructions.
    fn instructions(&self) -> String;

    /// Replace the system instructions.
    fn set_instructions(&self, instructions: String);

    /// Answer `messages`, streaming every event as it is produced. The last
    /// item of a successful stream is [`AgentEvent::Finished`].
    fn on_messages_stream(&self, messages: Vec<Message>, cancel: CancellationToken) -> EventStream<'_>;

    /// Answer `messages` and return the aggregated response.
    async fn on_messages(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<Response, ParleyError> {
        collect_response(self.on_messages_stream(messages, cancel)).await
    }

    /// Clear any state accumulated across calls.
    async fn reset(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

/// Drain an event stream and return its terminal response.
pub async fn collect_response(mut stream: EventStream<'_>) -> Result<Response, ParleyError> {
    let mut response = None;
    while let Some(event) = stream.next().await {
        if let AgentEvent::Finished { response: finished } = event? {
            response = Some(finished);
        }
    }
    response.ok_or_else(|| ParleyError::Model("event stream ended without a response".into()))
}
