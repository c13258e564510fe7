//! Agent that executes fenced code blocks found in the conversation.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::Agent;
use crate::agent_loop::{AgentEvent, EventStream, Response, TerminationState, CANCELLED_NOTICE};
use crate::config::DEFAULT_CODE_TIMEOUT_SECS;
use crate::error::ParleyError;
use crate::types::Message;

const OUTPUT_MAX_BYTES: usize = 32_768;

/// Reply sent when the conversation contains nothing to run.
pub const NO_CODE_BLOCKS: &str =
    "No code blocks found in the thread. Please provide at least one markdown-encoded code block to execute.";

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?P<lang>[\w+-]*)[^\n]*\n(?P<code>.*?)```").expect("valid code block regex")
    })
}

/// A fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

/// Extract fenced code blocks from markdown text, in order.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    code_block_regex()
        .captures_iter(text)
        .map(|caps| CodeBlock {
            language: caps["lang"].to_ascii_lowercase(),
            code: caps["code"].to_string(),
        })
        .filter(|block| !block.code.trim().is_empty())
        .collect()
}

/// Outcome of running a batch of code blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeResult {
    /// Exit code of the last block run; `None` if it never finished.
    pub exit_code: Option<i32>,
    pub output: String,
}

/// Backend that runs code blocks.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Executor subtype name (e.g., "local").
    fn kind(&self) -> &str;

    async fn execute(
        &self,
        blocks: &[CodeBlock],
        cancel: CancellationToken,
    ) -> Result<CodeResult, ParleyError>;
}

/// Runs shell and Python blocks as local child processes.
#[derive(Debug, Clone)]
pub struct LocalCommandExecutor {
    work_dir: Option<PathBuf>,
    timeout: Duration,
}

impl LocalCommandExecutor {
    pub fn new() -> Self {
        Self {
            work_dir: None,
            timeout: Duration::from_secs(DEFAULT_CODE_TIMEOUT_SECS),
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_for(&self, block: &CodeBlock) -> Option<tokio::process::Command> {
        let (program, flag) = match block.language.as_str() {
            "" | "sh" | "bash" | "shell" | "console" => ("sh", "-c"),
            "python" | "py" | "python3" => ("python3", "-c"),
            _ => return None,
        };
        let mut command = tokio::process::Command::new(program);
        command.arg(flag).arg(&block.code).kill_on_drop(true);
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }
        Some(command)
    }
}

impl Default for LocalCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeExecutor for LocalCommandExecutor {
    fn kind(&self) -> &str {
        "local"
    }

    async fn execute(
        &self,
        blocks: &[CodeBlock],
        cancel: CancellationToken,
    ) -> Result<CodeResult, ParleyError> {
        let mut combined = String::new();
        let mut exit_code = Some(0);
        for block in blocks {
            let Some(mut command) = self.command_for(block) else {
                combined.push_str(&format!("unsupported language '{}'\n", block.language));
                exit_code = Some(1);
                break;
            };
            let run = tokio::time::timeout(self.timeout, command.output());
            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ParleyError::Cancelled),
                output = run => output,
            };
            match output {
                Ok(Ok(output)) => {
                    combined.push_str(&String::from_utf8_lossy(&output.stdout));
                    combined.push_str(&String::from_utf8_lossy(&output.stderr));
                    exit_code = output.status.code();
                    if exit_code != Some(0) {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    return Err(ParleyError::ToolExecution {
                        tool_name: "code_executor".into(),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    combined.push_str(&format!("timed out after {}s\n", self.timeout.as_secs()));
                    exit_code = None;
                    break;
                }
            }
        }
        Ok(CodeResult {
            exit_code,
            output: truncate_utf8(combined, OUTPUT_MAX_BYTES),
        })
    }
}

fn truncate_utf8(mut s: String, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s;
    }
    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    s.truncate(cutoff);
    s.push_str("\n... (truncated)");
    s
}

/// Runs the code blocks of the most recent message that has any.
pub struct CodeExecutorAgent {
    name: String,
    description: String,
    instructions: RwLock<String>,
    executor: Arc<dyn CodeExecutor>,
}

impl CodeExecutorAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        executor: Arc<dyn CodeExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: RwLock::new(String::new()),
            executor,
        }
    }

    pub fn with_instructions(self, instructions: impl Into<String>) -> Self {
        self.set_instructions(instructions.into());
        self
    }

    pub fn executor_kind(&self) -> &str {
        self.executor.kind()
    }
}

#[async_trait]
impl Agent for CodeExecutorAgent {
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
            let blocks = messages
                .iter()
                .rev()
                .map(|message| extract_code_blocks(&message.text_content()))
                .find(|blocks| !blocks.is_empty())
                .unwrap_or_default();

            let reply = if blocks.is_empty() {
                NO_CODE_BLOCKS.to_string()
            } else {
                tracing::debug!(agent = %self.name, blocks = blocks.len(), "executing code blocks");
                match self.executor.execute(&blocks, cancel.clone()).await {
                    Ok(result) => match result.exit_code {
                        Some(0) => result.output,
                        Some(code) => format!("exit code {code}\n{}", result.output),
                        None => format!("execution did not finish\n{}", result.output),
                    },
                    Err(ParleyError::Cancelled) => {
                        yield Ok(AgentEvent::message(Message::system(CANCELLED_NOTICE)));
                        yield Err(ParleyError::Cancelled);
                        return;
                    }
                    Err(err) => format!("execution failed: {err}"),
                }
            };

            let message = Message::text(self.name.clone(), reply);
            yield Ok(AgentEvent::message(message.clone()));
            yield Ok(AgentEvent::Finished {
                response: Response::new(message, Vec::new(), TerminationState::Completed),
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_blocks_with_languages() {
        let text = "Run this:\n```python\nprint(1)\n```\nand\n```sh\necho hi\n```";
        let blocks = extract_code_blocks(text);
        assert_eq!(
            blocks,
            vec![
                CodeBlock {
                    language: "python".into(),
                    code: "print(1)\n".into()
                },
                CodeBlock {
                    language: "sh".into(),
                    code: "echo hi\n".into()
                },
            ]
        );
    }

    #[test]
    fn text_without_fences_has_no_blocks() {
        assert!(extract_code_blocks("just prose").is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(10);
        let out = truncate_utf8(s, 5);
        assert!(out.starts_with("éé"));
        assert!(out.ends_with("(truncated)"));
    }

    #[tokio::test]
    async fn unsupported_language_reports_without_running() {
        let executor = LocalCommandExecutor::new();
        let result = executor
            .execute(
                &[CodeBlock {
                    language: "cobol".into(),
                    code: "DISPLAY 'HI'".into(),
                }],
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert!(result.output.contains("cobol"));
    }

    #[tokio::test]
    async fn agent_replies_when_no_code_is_present() {
        let agent = CodeExecutorAgent::new("runner", "runs code", Arc::new(LocalCommandExecutor::new()));
        let response = agent
            .on_messages(vec![Message::user("no code here")], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.final_message.text_content(), NO_CODE_BLOCKS);
        assert_eq!(response.state, TerminationState::Completed);
    }
}
