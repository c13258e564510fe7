//! Conversation messages exchanged between agents, tools and callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::MediaItem;

/// Source label for messages produced by tool execution.
pub const TOOLS_SOURCE: &str = "tools";
/// Source label for caller-provided messages.
pub const USER_SOURCE: &str = "user";
/// Source label for engine notifications.
pub const SYSTEM_SOURCE: &str = "system";

/// A single immutable conversation turn.
///
/// Fields are only reachable through accessors so a message cannot change
/// after it has been created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    id: Uuid,
    source: String,
    created_at: DateTime<Utc>,
    content: MessageContent,
}

/// Message payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    Multimodal(Vec<ContentPart>),
    ToolCallRequest(Vec<ToolCall>),
    ToolCallResult(Vec<ToolResult>),
    System(String),
}

/// A single part of multimodal content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Media(MediaItem),
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Output produced by one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    Text(String),
    Json(serde_json::Value),
    /// A decoded image or audio object.
    Media(MediaItem),
}

/// A tool execution result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub output: ToolOutput,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Successful text result.
    pub fn text(call_id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            output: ToolOutput::Text(text.into()),
            is_error: false,
        }
    }

    /// Failed invocation carrying the failure description.
    pub fn failure(call_id: impl Into<String>, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            output: ToolOutput::Text(error.into()),
            is_error: true,
        }
    }

    /// Result carrying a decoded media object.
    pub fn media(call_id: impl Into<String>, name: impl Into<String>, item: MediaItem) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            output: ToolOutput::Media(item),
            is_error: false,
        }
    }

    /// Textual rendering of the output.
    pub fn output_text(&self) -> String {
        match &self.output {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(serde_json::Value::String(text)) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
            ToolOutput::Media(item) => format!("[{} {}]", item.kind, item.mime_type),
        }
    }
}

impl Message {
    fn new(source: impl Into<String>, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            created_at: Utc::now(),
            content,
        }
    }

    /// Plain text message.
    pub fn text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source, MessageContent::Text(text.into()))
    }

    /// Caller-provided text message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(USER_SOURCE, text)
    }

    /// Engine notification.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM_SOURCE, MessageContent::System(text.into()))
    }

    /// Text followed by media parts.
    pub fn multimodal(source: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self::new(source, MessageContent::Multimodal(parts))
    }

    /// Tool call request issued by `source`.
    pub fn tool_call_request(source: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self::new(source, MessageContent::ToolCallRequest(calls))
    }

    /// Tool results, attributed to the tools source.
    pub fn tool_call_result(results: Vec<ToolResult>) -> Self {
        Self::new(TOOLS_SOURCE, MessageContent::ToolCallResult(results))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text_content(&self) -> String {
        match &self.content {
            MessageContent::Text(text) | MessageContent::System(text) => text.clone(),
            MessageContent::Multimodal(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Media(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::ToolCallRequest(calls) => calls
                .iter()
                .map(|call| format!("{}({})", call.name, call.arguments))
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::ToolCallResult(results) => results
                .iter()
                .map(ToolResult::output_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Media items embedded in this message.
    pub fn media(&self) -> Vec<&MediaItem> {
        match &self.content {
            MessageContent::Multimodal(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Media(item) => Some(item),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self.content, MessageContent::System(_))
    }

    pub fn is_multimodal(&self) -> bool {
        matches!(self.content, MessageContent::Multimodal(_))
    }
}
