// toolloop-core/src/strategies/complete_task.rs
use super::{NextStep, Strategy};
use crate::errors::LoopError;
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::{AgentState, ToolExecutionResult};
use tracing::warn;

/// Keeps calling the oracle until it answers without requesting tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompleteTaskStrategy;

impl CompleteTaskStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for CompleteTaskStrategy {
    fn name(&self) -> &'static str {
        "CompleteTask"
    }

    fn initialize_interaction(&self, _state: &mut AgentState) -> Result<NextStep, LoopError> {
        // The user's request is already in the transcript.
        Ok(NextStep::CallApi)
    }

    fn process_api_response(
        &self,
        state: &mut AgentState,
        response: ApiResponse,
    ) -> Result<NextStep, LoopError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LoopError::Strategy("API response contained no choices".to_string()))?;

        let assistant_message = choice.message;

        if assistant_message.has_tool_calls() {
            let tool_calls = assistant_message.tool_calls.clone().unwrap_or_default();
            state.add_message(assistant_message);
            state.set_tool_calls(tool_calls.clone());
            return Ok(NextStep::CallTools(tool_calls));
        }

        match choice.finish_reason.as_str() {
            "stop" | "stop_sequence" | "end_turn" | "" => {}
            "tool_calls" | "tool_use" => {
                warn!("Finish reason indicates tool use, but no tool calls were sent. Treating as final.");
            }
            "length" | "max_tokens" => {
                warn!("Response was truncated by the output limit. Treating as final.");
            }
            other_reason => {
                warn!("Unknown API finish reason: '{}'. Assuming completion.", other_reason);
            }
        }

        let final_message = assistant_message.content.clone().unwrap_or_default();
        if final_message.trim().is_empty() {
            warn!("Oracle returned an empty final message.");
        }
        state.add_message(assistant_message);
        state.set_tool_calls(Vec::new());
        Ok(NextStep::Completed(final_message))
    }

    fn process_tool_results(
        &self,
        state: &mut AgentState,
        results: Vec<ToolExecutionResult>,
    ) -> Result<NextStep, LoopError> {
        let expected = state.pending_tool_calls.len();
        if results.len() != expected {
            return Err(LoopError::Strategy(format!(
                "expected {} tool result(s), got {}",
                expected,
                results.len()
            )));
        }
        for result in results {
            state.add_message(ChatMessage::tool_result(
                result.tool_call_id,
                result.tool_name,
                result.output,
            ));
        }
        state.set_tool_calls(Vec::new());
        Ok(NextStep::CallApi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{Choice, Role};
    use crate::models::tools::ToolCall;
    use crate::ToolExecutionStatus;

    fn response(message: ChatMessage, finish_reason: &str) -> ApiResponse {
        ApiResponse {
            id: "resp".to_string(),
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: finish_reason.to_string(),
            }],
        }
    }

    #[test]
    fn test_final_answer_completes() {
        let strategy = CompleteTaskStrategy::new();
        let mut state = AgentState::new(vec![ChatMessage::user("hi")]);
        let next = strategy
            .process_api_response(&mut state, response(ChatMessage::assistant("hello"), "stop"))
            .unwrap();
        assert_eq!(next, NextStep::Completed("hello".to_string()));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_tool_calls_are_recorded_then_answered_in_order() {
        let strategy = CompleteTaskStrategy::new();
        let mut state = AgentState::new(vec![ChatMessage::user("hi")]);
        let calls = vec![
            ToolCall::function("a", "first", "{}"),
            ToolCall::function("b", "second", "{}"),
        ];
        let assistant = ChatMessage {
            role: Role::Assistant,
            tool_calls: Some(calls.clone()),
            ..Default::default()
        };
        let next = strategy
            .process_api_response(&mut state, response(assistant, "tool_calls"))
            .unwrap();
        assert_eq!(next, NextStep::CallTools(calls));

        let results = ["a", "b"]
            .iter()
            .map(|id| ToolExecutionResult {
                tool_call_id: id.to_string(),
                tool_name: format!("tool_{}", id),
                input: serde_json::Value::Null,
                output: format!("out_{}", id),
                status: ToolExecutionStatus::Success,
                round: 1,
            })
            .collect();
        let next = strategy.process_tool_results(&mut state, results).unwrap();
        assert_eq!(next, NextStep::CallApi);
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.messages[2].tool_call_id.as_deref(), Some("a"));
        assert_eq!(state.messages[3].content.as_deref(), Some("out_b"));
        assert!(state.pending_tool_calls.is_empty());
    }

    #[test]
    fn test_no_choices_is_an_error() {
        let strategy = CompleteTaskStrategy::new();
        let mut state = AgentState::new(vec![ChatMessage::user("hi")]);
        let empty = ApiResponse {
            id: "x".to_string(),
            choices: vec![],
        };
        assert!(matches!(
            strategy.process_api_response(&mut state, empty),
            Err(LoopError::Strategy(_))
        ));
    }
}
