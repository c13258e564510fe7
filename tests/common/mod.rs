//! Shared test helpers and mock provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use parley::context;
use parley::error::ParleyError;
use parley::provider::{ModelProvider, RoundEvent, RoundRequest};
use parley::types::Message;

enum Reply {
    Text(String),
    Events(Vec<RoundEvent>),
}

/// A mock provider that plays back queued rounds.
///
/// Once the queue is empty every round answers `"<agent> has nothing to add"`.
/// Every request is recorded together with the agent bound in the context
/// registry at the time of the call.
pub struct MockProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RoundRequest>>,
    bound_agents: Mutex<Vec<Option<String>>>,
    hang: bool,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    /// Every round streams a partial fragment and then never finishes.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    /// Provider that answers with the given texts, in order.
    pub fn replying(texts: &[&str]) -> Arc<Self> {
        let provider = Self::build(false);
        for text in texts {
            provider.queue_reply(text);
        }
        Arc::new(provider)
    }

    fn build(hang: bool) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            bound_agents: Mutex::new(Vec::new()),
            hang,
        }
    }

    /// Queue a round whose final message is `text`, attributed to the
    /// requesting agent.
    pub fn queue_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Reply::Text(text.to_string()));
    }

    /// Queue a round made of explicit events.
    pub fn queue_events(&self, events: Vec<RoundEvent>) {
        self.replies.lock().unwrap().push_back(Reply::Events(events));
    }

    pub fn requests(&self) -> Vec<RoundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn bound_agents(&self) -> Vec<Option<String>> {
        self.bound_agents.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn stream_round(
        &self,
        request: RoundRequest,
        _cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<RoundEvent, ParleyError>>, ParleyError> {
        self.bound_agents.lock().unwrap().push(context::current_name());
        let agent = request.agent.clone();
        self.requests.lock().unwrap().push(request);

        if self.hang {
            let partial = futures::stream::iter(vec![Ok(RoundEvent::TextDelta {
                text: "thinking".into(),
            })]);
            return Ok(Box::pin(partial.chain(futures::stream::pending())));
        }

        let reply = self.replies.lock().unwrap().pop_front();
        let events = match reply {
            Some(Reply::Events(events)) => events,
            Some(Reply::Text(text)) => vec![RoundEvent::RoundResult {
                message: Message::text(agent, text),
            }],
            None => vec![RoundEvent::RoundResult {
                message: Message::text(agent.clone(), format!("{agent} has nothing to add")),
            }],
        };
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

/// A 1x1 transparent PNG.
pub const PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub fn png_bytes() -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(PNG_BASE64)
        .unwrap()
}
