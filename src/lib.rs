//! Parley: turn-based conversations between autonomous agents.
//!
//! A single agent is driven by the [`TurnLoop`](agent_loop::TurnLoop), which
//! repeatedly asks a [`ModelProvider`](provider::ModelProvider) for a round,
//! classifies tool output into multimodal messages, and stops on a
//! termination phrase or an iteration cap. A [`Team`](team::Team) composes
//! several agents behind the same [`Agent`](agent::Agent) interface and picks
//! the next speaker with a [`SelectionStrategy`](team::SelectionStrategy).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use parley::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(provider: Arc<dyn ModelProvider>) -> parley::error::Result<()> {
//! let factory = AgentFactory::new(ProviderRegistry::with_default(provider));
//! let descriptor = AgentDescriptor::builder()
//!     .name("writer")
//!     .instructions("Write a haiku, then say TERMINATE.")
//!     .kind(BehaviorKind::Looping)
//!     .build();
//! let agent = factory.build(&descriptor)?;
//! let response = agent
//!     .on_messages(vec![Message::user("autumn")], CancellationToken::new())
//!     .await?;
//! println!("{}", response.final_message.text_content());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod team;
pub mod tools;
pub mod types;
