//! Decorator that binds the context registry around every agent call.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Agent, AgentRef};
use crate::agent_loop::{EventStream, Response};
use crate::context;
use crate::error::ParleyError;
use crate::types::Message;

/// Wraps an agent so that [`context::current`] returns it for the duration of
/// each call, restoring the previous binding afterwards.
pub struct ContextScoped {
    inner: AgentRef,
}

impl ContextScoped {
    pub fn new(inner: AgentRef) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &AgentRef {
        &self.inner
    }
}

#[async_trait]
impl Agent for ContextScoped {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn instructions(&self) -> String {
        self.inner.instructions()
    }

    fn set_instructions(&self, instructions: String) {
        self.inner.set_instructions(instructions);
    }

    fn on_messages_stream(&self, messages: Vec<Message>, cancel: CancellationToken) -> EventStream<'_> {
        let stream = self.inner.on_messages_stream(messages, cancel);
        Box::pin(context::bind_stream(self.inner.clone(), stream))
    }

    async fn on_messages(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<Response, ParleyError> {
        context::bind(self.inner.clone(), self.inner.on_messages(messages, cancel)).await
    }

    async fn reset(&self) -> Result<(), ParleyError> {
        context::bind(self.inner.clone(), self.inner.reset()).await
    }
}
