//! Speaker selection strategies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use strum::Display;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentRef;
use crate::error::ParleyError;
use crate::provider::{ModelProvider, RoundEvent, RoundRequest};
use crate::types::Message;

/// Placeholder that a selection pattern must contain.
pub const AGENT_NAME_PLACEHOLDER: &str = "{agent_name}";

/// Prompt used by [`LlmSelector`] when the team has none configured.
pub const DEFAULT_SELECTOR_PROMPT: &str = "You are in a role play game. The following roles are available:
{roles}.
Read the following conversation. Then select the next role from {participants} to play. Only return the role.

{history}

Read the above conversation. Then select the next role from {participants} to play. Only return the role.";

/// Where a team is in its speaker-selection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SelectionState {
    AwaitingFirstTurn,
    Selecting,
    Stopped,
}

/// Everything a strategy may look at when picking the next speaker.
pub struct SelectionContext<'a> {
    pub team: &'a str,
    pub participants: &'a [AgentRef],
    pub history: &'a [Message],
    /// Index of the previous speaker, `None` before the first turn.
    pub previous: Option<usize>,
}

impl SelectionContext<'_> {
    fn participant_names(&self) -> Vec<&str> {
        self.participants.iter().map(|agent| agent.name()).collect()
    }
}

/// Picks the name of the next speaker. The orchestrator rejects names that
/// are not team members with [`ParleyError::Selection`].
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    async fn select(
        &self,
        ctx: SelectionContext<'_>,
        cancel: CancellationToken,
    ) -> Result<String, ParleyError>;
}

/// Cycles through participants in declaration order, starting at the first.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

#[async_trait]
impl SelectionStrategy for RoundRobin {
    async fn select(
        &self,
        ctx: SelectionContext<'_>,
        _cancel: CancellationToken,
    ) -> Result<String, ParleyError> {
        let count = ctx.participants.len();
        if count == 0 {
            return Err(ParleyError::selection("<none>", ctx.team));
        }
        let index = ctx.previous.map_or(0, |previous| (previous + 1) % count);
        Ok(ctx.participants[index].name().to_string())
    }
}

/// Asks the orchestrator's model to name the next speaker.
pub struct LlmSelector {
    orchestrator: String,
    provider: Arc<dyn ModelProvider>,
    prompt: String,
}

impl LlmSelector {
    pub fn new(orchestrator: impl Into<String>, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            orchestrator: orchestrator.into(),
            provider,
            prompt: DEFAULT_SELECTOR_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    fn render_prompt(&self, ctx: &SelectionContext<'_>) -> String {
        let roles = ctx
            .participants
            .iter()
            .map(|agent| format!("{}: {}", agent.name(), agent.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let participants = format!("[{}]", ctx.participant_names().join(", "));
        let history = ctx
            .history
            .iter()
            .map(|message| format!("{}: {}", message.source(), message.text_content()))
            .collect::<Vec<_>>()
            .join("\n");
        self.prompt
            .replace("{roles}", &roles)
            .replace("{participants}", &participants)
            .replace("{history}", &history)
    }
}

#[async_trait]
impl SelectionStrategy for LlmSelector {
    async fn select(
        &self,
        ctx: SelectionContext<'_>,
        cancel: CancellationToken,
    ) -> Result<String, ParleyError> {
        let prompt = self.render_prompt(&ctx);
        let request = RoundRequest::new(self.orchestrator.clone(), vec![Message::user(prompt)]);
        let mut events = self.provider.stream_round(request, cancel.clone()).await?;

        let mut fragments = String::new();
        let mut result: Option<String> = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ParleyError::Cancelled),
                next = events.next() => next,
            };
            match next {
                None => break,
                Some(event) => match event? {
                    RoundEvent::TextDelta { text } => fragments.push_str(&text),
                    RoundEvent::RoundResult { message } => result = Some(message.text_content()),
                    RoundEvent::ToolCallRequest { .. } | RoundEvent::ToolCallResult { .. } => {}
                },
            }
        }
        let name = result.unwrap_or(fragments).trim().to_string();
        tracing::debug!(team = ctx.team, selected = %name, "model selected next speaker");
        Ok(name)
    }
}

/// Deterministic selection from the trailing text of the last message.
#[derive(Debug, Clone)]
pub struct PatternSelector {
    pattern: Regex,
    fallback: String,
}

impl PatternSelector {
    /// Compile a template such as `"NEXT AGENT: {agent_name}"`. When the
    /// template does not match, `fallback` speaks.
    pub fn compile(template: &str, fallback: impl Into<String>) -> Result<Self, ParleyError> {
        let (prefix, suffix) = template.split_once(AGENT_NAME_PLACEHOLDER).ok_or_else(|| {
            ParleyError::construction(format!(
                "selection pattern '{template}' must contain {AGENT_NAME_PLACEHOLDER}"
            ))
        })?;
        let source = format!(
            r"{}\s*(?P<agent_name>[\w-]+)\s*{}\s*\.?\s*$",
            regex::escape(prefix.trim_end()),
            regex::escape(suffix.trim()),
        );
        let pattern = Regex::new(&source)
            .map_err(|e| ParleyError::construction(format!("invalid selection pattern: {e}")))?;
        Ok(Self {
            pattern,
            fallback: fallback.into(),
        })
    }

    /// Captured name from `text`, if the pattern matches its tail.
    pub fn match_name(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text.trim_end())
            .and_then(|caps| caps.name("agent_name"))
            .map(|name| name.as_str().to_string())
    }
}

#[async_trait]
impl SelectionStrategy for PatternSelector {
    async fn select(
        &self,
        ctx: SelectionContext<'_>,
        _cancel: CancellationToken,
    ) -> Result<String, ParleyError> {
        let matched = ctx
            .history
            .last()
            .and_then(|message| self.match_name(&message.text_content()));
        Ok(matched.unwrap_or_else(|| self.fallback.clone()))
    }
}
