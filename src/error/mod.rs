//! Error types for Parley.

use thiserror::Error;

/// Primary error type for all Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Construction error: {0}")]
    Construction(String),

    #[error("Selection error: '{name}' is not a member of team {team}")]
    Selection { name: String, team: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broad error category used to route propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Setup-time failure; the conversation never starts.
    Construction,
    /// Interrupts the current team round.
    Selection,
    /// Intentional abort path.
    Cancellation,
    /// Folded back into the conversation as content.
    ToolExecution,
    Configuration,
    Model,
    Io,
    Serialization,
    Unknown,
}

impl ParleyError {
    /// Create a construction error.
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    /// Create a selection error for a speaker name outside the team.
    pub fn selection(name: impl Into<String>, team: impl Into<String>) -> Self {
        Self::Selection {
            name: name.into(),
            team: team.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Construction(_) => ErrorCategory::Construction,
            Self::Selection { .. } => ErrorCategory::Selection,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Model(_) => ErrorCategory::Model,
            Self::Io(_) => ErrorCategory::Io,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidArgument(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is a defect that aborts the run. Tool failures are
    /// folded back into the conversation and cancellation is a requested
    /// stop, so neither counts.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::ToolExecution | ErrorCategory::Cancellation
        )
    }

    /// Whether this error is the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Non-fatal warning raised when a single media candidate cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not decode media candidate '{candidate}': {reason}")]
pub struct ClassificationWarning {
    pub candidate: String,
    pub reason: String,
}

impl ClassificationWarning {
    pub fn new(candidate: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut candidate = candidate.into();
        if candidate.len() > 64 {
            let mut cutoff = 64;
            while !candidate.is_char_boundary(cutoff) {
                cutoff -= 1;
            }
            candidate.truncate(cutoff);
            candidate.push('…');
        }
        Self {
            candidate,
            reason: reason.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_error_names_speaker_and_team() {
        let err = ParleyError::selection("Ghost", "research-team");
        let msg = err.to_string();
        assert!(msg.contains("Ghost"), "expected speaker in message: {msg}");
        assert!(msg.contains("research-team"), "expected team in message: {msg}");
        assert_eq!(err.category(), ErrorCategory::Selection);
    }

    #[test]
    fn tool_failures_and_cancellation_are_not_fatal() {
        let err = ParleyError::ToolExecution {
            tool_name: "search".to_string(),
            message: "boom".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(!ParleyError::Cancelled.is_fatal());
        assert!(ParleyError::construction("bad kind").is_fatal());
    }

    #[test]
    fn cancelled_is_detected() {
        assert!(ParleyError::Cancelled.is_cancelled());
        assert!(!ParleyError::Model("x".into()).is_cancelled());
    }

    #[test]
    fn classification_warning_truncates_long_candidates() {
        let warning = ClassificationWarning::new("A".repeat(200), "invalid base64");
        assert!(warning.candidate.chars().count() <= 65);
        assert!(warning.to_string().contains("invalid base64"));
    }
}
