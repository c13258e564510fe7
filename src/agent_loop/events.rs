//! Outward event stream types.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ParleyError;
use crate::types::Message;

use super::types::Response;

/// Event emitted by the turn loop and team streaming APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Streaming text fragment; not a committed turn.
    Partial { source: String, text: String },
    /// A message produced during the run (relayed or committed).
    Message { message: Message },
    /// Terminal event carrying the aggregated response.
    Finished { response: Response },
}

impl AgentEvent {
    pub fn message(message: Message) -> Self {
        Self::Message { message }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message { message } => Some(message),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Finished { response } => Some(response),
            _ => None,
        }
    }
}

/// Lazy, non-restartable event stream.
pub type EventStream<'a> = BoxStream<'a, Result<AgentEvent, ParleyError>>;
