//! Run outcome types shared by the turn loop and teams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Message;

/// How a run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationState {
    /// The sentinel phrase appeared in a final message.
    Terminated,
    /// The iteration cap was exceeded.
    Capped,
    /// A single-round agent finished, or a team hit its message cap.
    Completed,
    /// Recorded by callers for runs aborted through the cancellation token;
    /// the streams themselves end with `ParleyError::Cancelled`.
    Cancelled,
}

/// Aggregated result of one agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub final_message: Message,
    /// Messages produced before `final_message` (empty unless requested).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner_messages: Vec<Message>,
    pub state: TerminationState,
    pub finished_at: DateTime<Utc>,
}

impl Response {
    pub fn new(final_message: Message, inner_messages: Vec<Message>, state: TerminationState) -> Self {
        Self {
            final_message,
            inner_messages,
            state,
            finished_at: Utc::now(),
        }
    }
}
