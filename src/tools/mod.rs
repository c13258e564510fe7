//! Tool system for function calling.

pub mod arguments;
pub mod execute;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use execute::execute_tool_calls;
pub use registry::ToolRegistry;
pub use tool::{FunctionTool, Tool, ToolExecutionContext};
pub use types::{ParameterBuilder, ToolParameters};
