//! Run model-requested tool calls, folding failures into results.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use crate::error::ParleyError;
use crate::types::{ToolCall, ToolResult};

/// Execute `calls` in order against `tools`.
///
/// A failing tool (unknown name, bad arguments, or an error from the tool
/// itself) becomes a [`ToolResult`] with `is_error` set so the model can
/// react to it. Only cancellation aborts the batch.
pub async fn execute_tool_calls(
    tools: &[Arc<dyn Tool>],
    calls: &[ToolCall],
    cancel: &CancellationToken,
) -> Result<Vec<ToolResult>, ParleyError> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        if cancel.is_cancelled() {
            return Err(ParleyError::Cancelled);
        }
        let Some(tool) = tools.iter().find(|t| t.name() == call.name) else {
            results.push(ToolResult::failure(
                &call.id,
                &call.name,
                format!("Tool '{}' not found", call.name),
            ));
            continue;
        };

        let args = ToolArguments::new(call.arguments.clone());
        if let Some(field) = missing_required_field(tool.as_ref(), &args) {
            results.push(ToolResult::failure(
                &call.id,
                &call.name,
                format!("missing required field '{field}'"),
            ));
            continue;
        }

        let ctx = ToolExecutionContext {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
            cancel: cancel.clone(),
        };
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(ParleyError::Cancelled),
            outcome = tool.execute(&args, &ctx) => outcome,
        };
        match outcome {
            Ok(output) => results.push(ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                output,
                is_error: false,
            }),
            Err(ParleyError::Cancelled) => return Err(ParleyError::Cancelled),
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "tool execution failed");
                results.push(ToolResult::failure(&call.id, &call.name, err.to_string()));
            }
        }
    }
    Ok(results)
}

fn missing_required_field<'a>(tool: &'a dyn Tool, args: &ToolArguments) -> Option<&'a str> {
    let obj = args.raw().as_object()?;
    tool.parameters()
        .required()
        .into_iter()
        .find(|field| !obj.contains_key(*field))
}
