// toolloop-core/src/strategies/mod.rs
use crate::errors::LoopError;
use crate::models::chat::ApiResponse;
use crate::models::tools::ToolCall;
use crate::{AgentState, ToolExecutionResult};

pub mod complete_task;

/// What the loop should do after a strategy has looked at the latest event.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    /// Send the current transcript to the oracle (counts as a new round).
    CallApi,
    /// Execute these tool calls, then report back via `process_tool_results`.
    CallTools(Vec<ToolCall>),
    /// The run is finished with this final answer.
    Completed(String),
}

/// Decides how oracle responses and tool results move the conversation on.
///
/// The loop owns the round budget, timeouts, cancellation and tool execution;
/// a strategy only interprets responses and edits the transcript.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn initialize_interaction(&self, state: &mut AgentState) -> Result<NextStep, LoopError>;

    fn process_api_response(
        &self,
        state: &mut AgentState,
        response: ApiResponse,
    ) -> Result<NextStep, LoopError>;

    fn process_tool_results(
        &self,
        state: &mut AgentState,
        results: Vec<ToolExecutionResult>,
    ) -> Result<NextStep, LoopError>;
}
