// toolloop-core/src/errors.rs
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while running the tool-calling loop.
///
/// `UnknownTool`, `InvalidToolArguments` and `ToolHandlerFailure` are raised
/// while executing a single tool call and are normally rendered back into the
/// conversation as a tool-result message rather than returned to the caller.
#[derive(Error, Debug)]
pub enum LoopError {
    /// A tool with this name is already present in the registry.
    #[error("Duplicate tool name: '{0}' is already registered")]
    DuplicateToolName(String),

    /// The oracle asked for a tool that is not in the registry.
    #[error("Unknown tool: '{0}'")]
    UnknownTool(String),

    /// The oracle supplied arguments that do not satisfy the tool's schema.
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    /// The tool handler itself reported a failure.
    #[error("Tool '{tool}' failed: {source}")]
    ToolHandlerFailure {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    /// The oracle did not answer within the configured timeout.
    #[error("Oracle call timed out after {0:?}")]
    OracleTimeout(Duration),

    /// The request to the oracle failed (network, HTTP status, malformed body).
    #[error("Oracle transport error: {0}")]
    OracleTransportError(#[source] anyhow::Error),

    /// The round budget was exhausted without a final answer.
    #[error("Tool loop exceeded {rounds} round(s) without a final answer")]
    ToolLoopExceeded { rounds: usize },

    /// The oracle's output could not be coerced into the requested schema.
    #[error("Structured output coercion failed after {attempts} attempt(s): {reason}")]
    SchemaCoercionFailed { attempts: usize, reason: String },

    /// A registered tool reads a context key the host did not supply.
    #[error("Tool '{tool}' requires execution context key '{key}', which was not supplied")]
    MissingExecutionContext { tool: String, key: String },

    /// The run was cancelled by the host.
    #[error("Run cancelled")]
    Cancelled,

    /// The oracle response could not be interpreted by the strategy.
    #[error("Strategy Error: {0}")]
    Strategy(String),

    /// Error related to configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),
}

impl LoopError {
    pub fn config(msg: impl Into<String>) -> Self {
        LoopError::Config(msg.into())
    }

    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        LoopError::InvalidToolArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Whether the loop feeds this error back to the oracle as a tool result
    /// instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LoopError::UnknownTool(_)
                | LoopError::InvalidToolArguments { .. }
                | LoopError::ToolHandlerFailure { .. }
        )
    }

    /// Text placed in a tool-result message for a recoverable error.
    pub fn to_tool_result(&self) -> String {
        match self {
            LoopError::UnknownTool(name) => format!(
                "Error: UnknownTool: no tool named '{}' is available. Use one of the declared tools.",
                name
            ),
            LoopError::InvalidToolArguments { tool, reason } => format!(
                "Error: InvalidToolArguments: arguments for '{}' were rejected: {}",
                tool, reason
            ),
            LoopError::ToolHandlerFailure { tool, source } => {
                format!("Error: ToolHandlerFailure: '{}' failed: {:#}", tool, source)
            }
            other => format!("Error: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_recoverable_classification() {
        assert!(LoopError::UnknownTool("x".into()).is_recoverable());
        assert!(LoopError::invalid_arguments("x", "missing 'city'").is_recoverable());
        assert!(LoopError::ToolHandlerFailure {
            tool: "x".into(),
            source: anyhow!("boom")
        }
        .is_recoverable());
        assert!(!LoopError::OracleTimeout(Duration::from_secs(1)).is_recoverable());
        assert!(!LoopError::ToolLoopExceeded { rounds: 3 }.is_recoverable());
        assert!(!LoopError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_tool_result_text_names_error_kind() {
        let text = LoopError::UnknownTool("get_time".into()).to_tool_result();
        assert!(text.contains("UnknownTool"));
        assert!(text.contains("get_time"));

        let text = LoopError::invalid_arguments("get_weather", "missing required field 'city'")
            .to_tool_result();
        assert!(text.contains("InvalidToolArguments"));
        assert!(text.contains("city"));
    }
}
