//! Agent loop primitives (turn engine, events, responses).

pub mod engine;
pub mod events;
pub mod types;

pub use engine::{LoopMode, LoopSettings, Task, TurnLoop, CANCELLED_NOTICE};
pub use events::{AgentEvent, EventStream};
pub use types::{Response, TerminationState};
