//! Team orchestrator: several agents behind one agent-shaped interface.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::selection::{SelectionContext, SelectionState, SelectionStrategy};
use crate::agent::{Agent, AgentRef};
use crate::agent_loop::{AgentEvent, EventStream, Response, TerminationState, CANCELLED_NOTICE};
use crate::config::{DEFAULT_TEAM_MAX_MESSAGES, DEFAULT_TERMINATION_PHRASE};
use crate::error::ParleyError;
use crate::types::Message;

struct TeamState {
    transcript: Vec<Message>,
    seen: HashSet<Uuid>,
    previous: Option<usize>,
    selection: SelectionState,
}

impl TeamState {
    fn new() -> Self {
        Self {
            transcript: Vec::new(),
            seen: HashSet::new(),
            previous: None,
            selection: SelectionState::AwaitingFirstTurn,
        }
    }

    fn append(&mut self, message: Message) {
        if self.seen.insert(message.id()) {
            self.transcript.push(message);
        }
    }
}

/// Runs an inner multi-agent conversation for every incoming task and
/// answers with the last message produced.
///
/// The transcript accumulates across calls until [`Agent::reset`]. Incoming
/// messages already in the transcript (same id) are not appended again, so a
/// parent that passes its whole history each turn does not duplicate it.
pub struct Team {
    name: String,
    description: String,
    instructions: RwLock<String>,
    participants: Vec<AgentRef>,
    strategy: Box<dyn SelectionStrategy>,
    termination_phrase: String,
    max_messages: usize,
    include_inner_dialog: bool,
    state: Mutex<TeamState>,
}

impl Team {
    pub fn new(
        name: impl Into<String>,
        participants: Vec<AgentRef>,
        strategy: Box<dyn SelectionStrategy>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: RwLock::new(String::new()),
            participants,
            strategy,
            termination_phrase: DEFAULT_TERMINATION_PHRASE.to_string(),
            max_messages: DEFAULT_TEAM_MAX_MESSAGES,
            include_inner_dialog: false,
            state: Mutex::new(TeamState::new()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_termination_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.termination_phrase = phrase.into();
        self
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages.max(1);
        self
    }

    pub fn with_inner_dialog(mut self, include: bool) -> Self {
        self.include_inner_dialog = include;
        self
    }

    pub fn participants(&self) -> &[AgentRef] {
        &self.participants
    }

    /// Snapshot of the accumulated transcript.
    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.transcript.clone()
    }

    pub async fn selection_state(&self) -> SelectionState {
        self.state.lock().await.selection
    }
}

#[async_trait]
impl Agent for Team {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn instructions(&self) -> String {
        self.instructions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_instructions(&self, instructions: String) {
        *self
            .instructions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = instructions;
    }

    fn on_messages_stream(&self, messages: Vec<Message>, cancel: CancellationToken) -> EventStream<'_> {
        Box::pin(async_stream::stream! {
            let mut state = self.state.lock().await;
            for message in messages {
                state.append(message);
            }
            let input_end = state.transcript.len();
            let mut produced = 0usize;
            let mut terminated = false;

            while produced < self.max_messages {
                if cancel.is_cancelled() {
                    yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                    yield Err(ParleyError::Cancelled);
                    return;
                }

                state.selection = SelectionState::Selecting;
                let ctx = SelectionContext {
                    team: &self.name,
                    participants: &self.participants,
                    history: &state.transcript,
                    previous: state.previous,
                };
                let selected = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    selected = self.strategy.select(ctx, cancel.clone()) => Some(selected),
                };
                let name = match selected {
                    None | Some(Err(ParleyError::Cancelled)) => {
                        yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                        yield Err(ParleyError::Cancelled);
                        return;
                    }
                    Some(Err(err)) => {
                        yield Err(err);
                        return;
                    }
                    Some(Ok(name)) => name,
                };
                let Some(index) = self.participants.iter().position(|agent| agent.name() == name) else {
                    tracing::debug!(team = %self.name, speaker = %name, "selected speaker is not a member");
                    yield Err(ParleyError::selection(name, self.name.clone()));
                    return;
                };
                state.previous = Some(index);
                state.selection = SelectionState::AwaitingFirstTurn;
                tracing::debug!(team = %self.name, speaker = %name, turn = produced + 1, "speaker selected");

                let speaker = self.participants[index].clone();
                let mut turn = speaker.on_messages_stream(state.transcript.clone(), cancel.clone());
                let mut response: Option<Response> = None;
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        next = turn.next() => Some(next),
                    };
                    match next {
                        None => {
                            yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                            yield Err(ParleyError::Cancelled);
                            return;
                        }
                        Some(None) => break,
                        Some(Some(Ok(AgentEvent::Finished { response: finished }))) => {
                            response = Some(finished);
                        }
                        Some(Some(Ok(event))) => yield Ok(event),
                        // Cancellation notices from the speaker were already relayed.
                        Some(Some(Err(err))) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
                drop(turn);

                let Some(response) = response else {
                    yield Err(ParleyError::Model(format!("{name} finished without a response")));
                    return;
                };
                let final_message = response.final_message;
                terminated = final_message.text_content().contains(&self.termination_phrase);
                state.append(final_message);
                produced += 1;
                if terminated {
                    break;
                }
            }

            state.selection = SelectionState::Stopped;
            let final_message = state
                .transcript
                .last()
                .cloned()
                .unwrap_or_else(|| Message::text(self.name.clone(), ""));
            let inner = if self.include_inner_dialog && state.transcript.len() > input_end {
                state.transcript[input_end..state.transcript.len() - 1].to_vec()
            } else {
                Vec::new()
            };
            let termination = if terminated {
                TerminationState::Terminated
            } else {
                TerminationState::Completed
            };
            tracing::debug!(team = %self.name, produced, state = ?termination, "team run finished");
            yield Ok(AgentEvent::Finished {
                response: Response::new(final_message, inner, termination),
            });
        })
    }

    async fn reset(&self) -> Result<(), ParleyError> {
        *self.state.lock().await = TeamState::new();
        for participant in &self.participants {
            participant.reset().await?;
        }
        tracing::debug!(team = %self.name, "team reset");
        Ok(())
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("name", &self.name)
            .field(
                "participants",
                &self.participants.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("max_messages", &self.max_messages)
            .finish()
    }
}
