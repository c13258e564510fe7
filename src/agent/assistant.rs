//! Model-backed agent driven by the turn loop.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::Agent;
use crate::agent_loop::{EventStream, LoopMode, LoopSettings, TurnLoop};
use crate::classify::ToolResultClassifier;
use crate::provider::ModelProvider;
use crate::tools::Tool;
use crate::types::Message;

/// An agent that answers by running a [`TurnLoop`] over the given messages.
///
/// In [`LoopMode::SingleRound`] it behaves as a plain assistant (one model
/// round per call); in [`LoopMode::Iterative`] it keeps going until the
/// termination phrase or the iteration cap.
pub struct AssistantAgent {
    name: String,
    description: String,
    instructions: Arc<RwLock<String>>,
    engine: TurnLoop,
}

impl AssistantAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        let name = name.into();
        let instructions = Arc::new(RwLock::new(String::new()));
        let engine = TurnLoop::new(name.clone(), provider)
            .with_shared_instructions(instructions.clone())
            .with_settings(LoopSettings::default().single_round());
        Self {
            name,
            description: description.into(),
            instructions,
            engine,
        }
    }

    pub fn with_instructions(self, instructions: impl Into<String>) -> Self {
        self.set_instructions(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.engine = self.engine.with_tools(tools);
        self
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.engine = self.engine.with_settings(settings);
        self
    }

    pub fn with_classifier(mut self, classifier: ToolResultClassifier) -> Self {
        self.engine = self.engine.with_classifier(classifier);
        self
    }

    pub fn mode(&self) -> LoopMode {
        self.engine.settings().mode
    }

    pub fn engine(&self) -> &TurnLoop {
        &self.engine
    }
}

#[async_trait]
impl Agent for AssistantAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn instructions(&self) -> String {
        self.engine.instructions()
    }

    fn set_instructions(&self, instructions: String) {
        *self
            .instructions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = instructions;
    }

    fn on_messages_stream(&self, messages: Vec<Message>, cancel: CancellationToken) -> EventStream<'_> {
        self.engine.run(messages, cancel)
    }
}

impl std::fmt::Debug for AssistantAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantAgent")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .finish()
    }
}
