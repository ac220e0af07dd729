// toolloop-core/src/lib.rs

#![doc = include_str!("../../README.md")]

pub mod agent;
pub mod api;
pub mod coercion;
pub mod config;
pub mod context;
pub mod errors;
pub mod providers;
pub mod strategies;
pub mod tools;
pub mod utils;

pub mod models {
    pub mod chat;
    pub mod tools;
}


pub use agent::Agent;
pub use coercion::{OutputSchema, StructuredOutputCoercer};
pub use config::{AgentConfig, LoopConfig, ModelConfig, ProviderInstanceConfig, RetryConfig};
pub use context::{ExecutionContext, ExecutionContextBuilder};
pub use errors::LoopError;
pub use models::chat::{ApiResponse, ChatMessage, Choice, Role};
pub use models::tools::{
    ToolCall, ToolDefinition, ToolFunction, ToolInput, ToolParameter, ToolParameterType,
    ToolParametersDefinition,
};
pub use providers::{Provider, ProviderRegistry};
pub use tools::{Tool, ToolHandler, ToolOutput, ToolRegistry};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Transcript and pending work of a single run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub messages: Vec<ChatMessage>,
    pub pending_tool_calls: Vec<ToolCall>,
}

impl AgentState {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            pending_tool_calls: Vec::new(),
        }
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn set_tool_calls(&mut self, tool_calls: Vec<ToolCall>) {
        self.pending_tool_calls = tool_calls;
    }
}

/// Represents the final output of an [`Agent::run`] execution.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AgentOutput {
    /// The content of the oracle's final message.
    pub final_message: String,
    /// The full transcript, including the final assistant message.
    pub messages: Vec<ChatMessage>,
    /// A list detailing the results of each tool executed during the run.
    pub applied_tool_results: Vec<ToolExecutionResult>,
    /// Number of oracle calls made.
    pub rounds: usize,
}

/// Details the execution result of a single tool call within an [`AgentOutput`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolExecutionResult {
    /// The unique ID associated with the oracle's request to call this tool.
    pub tool_call_id: String,
    /// The name of the tool that was requested.
    pub tool_name: String,
    /// The arguments as sent by the oracle (a JSON string if they did not parse).
    pub input: serde_json::Value,
    /// The tool-result content sent back to the oracle.
    pub output: String,
    pub status: ToolExecutionStatus,
    /// The round in which the call was made, starting at 1.
    pub round: usize,
}

/// Indicates whether a tool execution succeeded or failed.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum ToolExecutionStatus {
    Success,
    Failure,
}
