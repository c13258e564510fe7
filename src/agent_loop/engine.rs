//! Turn loop engine: drives one agent through model/tool rounds.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::classify::ToolResultClassifier;
use crate::config::ParleyConfig;
use crate::error::ParleyError;
use crate::provider::{ModelProvider, RoundEvent, RoundRequest};
use crate::tools::Tool;
use crate::types::{Attachment, ConversationHistory, Message};

use super::events::{AgentEvent, EventStream};
use super::types::{Response, TerminationState};

/// Text of the notification emitted before a cancellation propagates.
pub const CANCELLED_NOTICE: &str = "operation cancelled";

/// Whether the loop keeps going after the first round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// One round, then finish with [`TerminationState::Completed`].
    SingleRound,
    /// Repeat until the termination phrase appears or the cap is exceeded.
    Iterative,
}

/// Limits and stop conditions for a [`TurnLoop`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_iterations: usize,
    pub termination_phrase: String,
    /// Pause at the end of each round; zero is a bare yield.
    pub round_pause: Duration,
    pub mode: LoopMode,
}

impl LoopSettings {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            termination_phrase: config.termination_phrase.clone(),
            round_pause: config.round_pause(),
            mode: LoopMode::Iterative,
        }
    }

    pub fn single_round(mut self) -> Self {
        self.mode = LoopMode::SingleRound;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_termination_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.termination_phrase = phrase.into();
        self
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&ParleyConfig::default())
    }
}

/// Initial message(s) for a run.
#[derive(Debug, Clone)]
pub struct Task(Vec<Message>);

impl Task {
    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }
}

impl From<&str> for Task {
    fn from(text: &str) -> Self {
        Self(vec![Message::user(text)])
    }
}

impl From<String> for Task {
    fn from(text: String) -> Self {
        Self(vec![Message::user(text)])
    }
}

impl From<Message> for Task {
    fn from(message: Message) -> Self {
        Self(vec![message])
    }
}

impl From<Vec<Message>> for Task {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

/// Drives one agent through repeated rounds of: ask the provider, classify
/// tool results, append to history, until the termination phrase shows up in
/// a round's final content or the iteration cap is exceeded.
pub struct TurnLoop {
    agent: String,
    instructions: Arc<RwLock<String>>,
    provider: Arc<dyn ModelProvider>,
    tools: Vec<Arc<dyn Tool>>,
    classifier: ToolResultClassifier,
    settings: LoopSettings,
}

impl TurnLoop {
    pub fn new(agent: impl Into<String>, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            agent: agent.into(),
            instructions: Arc::new(RwLock::new(String::new())),
            provider,
            tools: Vec::new(),
            classifier: ToolResultClassifier::new(),
            settings: LoopSettings::default(),
        }
    }

    pub fn with_instructions(self, instructions: impl Into<String>) -> Self {
        self.set_instructions(instructions.into());
        self
    }

    /// Share an instructions cell with the owning agent so later edits are
    /// visible to the next round.
    pub fn with_shared_instructions(mut self, instructions: Arc<RwLock<String>>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_classifier(mut self, classifier: ToolResultClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn instructions(&self) -> String {
        self.instructions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_instructions(&self, instructions: String) {
        *self
            .instructions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = instructions;
    }

    /// Run the loop.
    ///
    /// The stream ends with [`AgentEvent::Finished`] unless cancelled, in
    /// which case a system notice is yielded followed by
    /// [`ParleyError::Cancelled`].
    pub fn run(&self, task: impl Into<Task>, cancel: CancellationToken) -> EventStream<'_> {
        let task: Task = task.into();
        Box::pin(async_stream::stream! {
            let mut history = ConversationHistory::new(task.into_messages());
            let start = history.len();
            let mut attachments: Vec<Attachment> = Vec::new();
            let mut last_final: Option<Message> = None;
            let mut round = 0usize;

            loop {
                if cancel.is_cancelled() {
                    yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                    yield Err(ParleyError::Cancelled);
                    return;
                }

                round += 1;
                if round > self.settings.max_iterations {
                    tracing::debug!(agent = %self.agent, round, "turn loop safety stop");
                    let notice = Message::system(format!(
                        "Safety stop: {} exceeded the maximum of {} iterations without terminating.",
                        self.agent, self.settings.max_iterations
                    ));
                    yield Ok(AgentEvent::message(notice.clone()));
                    let final_message = last_final.clone().unwrap_or(notice);
                    let inner = committed_before(history.since(start), &final_message);
                    yield Ok(AgentEvent::Finished {
                        response: Response::new(final_message, inner, TerminationState::Capped),
                    });
                    return;
                }

                tracing::debug!(agent = %self.agent, round, history = history.len(), "turn loop round start");
                let request = RoundRequest::new(self.agent.clone(), history.messages().to_vec())
                    .with_instructions(self.instructions())
                    .with_attachments(std::mem::take(&mut attachments))
                    .with_tools(self.tools.clone());

                let started = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    started = self.provider.stream_round(request, cancel.clone()) => Some(started),
                };
                let mut events = match started {
                    None => {
                        yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                        yield Err(ParleyError::Cancelled);
                        return;
                    }
                    Some(Err(err)) => {
                        yield Err(err);
                        return;
                    }
                    Some(Ok(events)) => events,
                };

                let mut buffer: Vec<Message> = Vec::new();
                let mut fragments = String::new();
                let mut round_final: Option<Message> = None;
                let mut cancelled = false;

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        next = events.next() => Some(next),
                    };
                    let event = match next {
                        None => {
                            cancelled = true;
                            break;
                        }
                        Some(None) => break,
                        Some(Some(Err(ParleyError::Cancelled))) => {
                            cancelled = true;
                            break;
                        }
                        Some(Some(Err(err))) => {
                            yield Err(err);
                            return;
                        }
                        Some(Some(Ok(event))) => event,
                    };

                    match event {
                        RoundEvent::TextDelta { text } => {
                            if !text.is_empty() {
                                fragments.push_str(&text);
                                yield Ok(AgentEvent::Partial { source: self.agent.clone(), text });
                            }
                        }
                        RoundEvent::ToolCallRequest { message } => {
                            yield Ok(AgentEvent::message(message));
                        }
                        RoundEvent::ToolCallResult { results } => {
                            for result in &results {
                                let classified = self.classifier.classify_result(result).await;
                                if let Some(attachment) = classified.attachment {
                                    attachments.push(attachment);
                                }
                                buffer.push(classified.message.clone());
                                yield Ok(AgentEvent::message(classified.message));
                            }
                        }
                        RoundEvent::RoundResult { message } => {
                            buffer.push(message.clone());
                            round_final = Some(message.clone());
                            yield Ok(AgentEvent::message(message));
                        }
                    }
                }

                if cancelled {
                    yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                    yield Err(ParleyError::Cancelled);
                    return;
                }

                if round_final.is_none() && !fragments.is_empty() {
                    let synthesized = Message::text(self.agent.clone(), std::mem::take(&mut fragments));
                    buffer.push(synthesized.clone());
                    round_final = Some(synthesized.clone());
                    yield Ok(AgentEvent::message(synthesized));
                }

                let appended = buffer.len();
                history.extend(buffer);
                let final_content = round_final.as_ref().map(Message::text_content);
                if let Some(message) = round_final {
                    last_final = Some(message);
                }
                tracing::debug!(agent = %self.agent, round, appended, "turn loop round complete");

                let terminated = final_content
                    .as_deref()
                    .is_some_and(|content| content.contains(&self.settings.termination_phrase));
                let state = if terminated {
                    Some(TerminationState::Terminated)
                } else if self.settings.mode == LoopMode::SingleRound {
                    Some(TerminationState::Completed)
                } else {
                    None
                };
                if let Some(state) = state {
                    let final_message = last_final
                        .clone()
                        .unwrap_or_else(|| Message::text(self.agent.clone(), ""));
                    let inner = committed_before(history.since(start), &final_message);
                    tracing::debug!(agent = %self.agent, round, ?state, "turn loop finished");
                    yield Ok(AgentEvent::Finished {
                        response: Response::new(final_message, inner, state),
                    });
                    return;
                }

                let resumed = if self.settings.round_pause.is_zero() {
                    tokio::task::yield_now().await;
                    !cancel.is_cancelled()
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        _ = tokio::time::sleep(self.settings.round_pause) => true,
                    }
                };
                if !resumed {
                    yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                    yield Err(ParleyError::Cancelled);
                    return;
                }
            }
        })
    }
}

fn committed_before(committed: &[Message], final_message: &Message) -> Vec<Message> {
    committed
        .iter()
        .filter(|message| message.id() != final_message.id())
        .cloned()
        .collect()
}
