// toolloop-core/src/agent.rs
use crate::config::LoopConfig;
use crate::context::ExecutionContext;
use crate::errors::LoopError;
use crate::models::chat::{ApiResponse, ChatMessage, Role};
use crate::models::tools::{ToolCall, ToolDefinition};
use crate::providers::Provider;
use crate::strategies::complete_task::CompleteTaskStrategy;
use crate::strategies::{NextStep, Strategy};
use crate::tools::ToolRegistry;
use crate::utils::one_line;
use crate::{AgentOutput, AgentState, ToolExecutionResult, ToolExecutionStatus};
use futures::future::join_all;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const LOG_PREVIEW_CHARS: usize = 200;

/// Runs the bounded tool-calling loop against a single oracle.
///
/// An `Agent` holds no per-request state: the transcript, the execution
/// context and the cancellation token are passed to [`Agent::run`], so one
/// agent can serve concurrent requests.
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    strategy: Box<dyn Strategy>,
    system_prompt: Option<String>,
    config: LoopConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>, config: LoopConfig) -> Self {
        info!(
            provider = %provider.name(),
            tools = registry.len(),
            max_rounds = config.max_rounds,
            "Initializing agent."
        );
        Self {
            provider,
            registry,
            strategy: Box::new(CompleteTaskStrategy::new()),
            system_prompt: None,
            config,
        }
    }

    /// Instruction prepended to every run whose transcript does not already
    /// begin with a system message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Drives the conversation until the oracle produces a final answer.
    ///
    /// Each round is one oracle call followed by the tool calls it requested.
    /// After `max_rounds` oracle calls without a final answer the run fails
    /// with [`LoopError::ToolLoopExceeded`]. Unknown tools, rejected arguments
    /// and handler failures are reported back to the oracle and do not end
    /// the run.
    pub async fn run(
        &self,
        messages: Vec<ChatMessage>,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<AgentOutput, LoopError> {
        info!(
            strategy = self.strategy.name(),
            num_initial_messages = messages.len(),
            context_keys = ?context.keys().collect::<Vec<_>>(),
            "Starting agent run."
        );

        if messages.is_empty() {
            error!("Agent run started with empty message history.");
            return Err(LoopError::config("Cannot run agent with empty message history"));
        }
        if self.config.max_rounds == 0 {
            error!("Agent run started with a round budget of zero.");
            return Err(LoopError::config("max_rounds must be at least 1"));
        }
        if let Err(e) = self.registry.check_context(context) {
            error!(error = %e, "Execution context is missing a required key.");
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(LoopError::Cancelled);
        }

        let mut state = AgentState::new(self.prepare_messages(messages));
        let tool_definitions = self.registry.definitions();
        let tools = if tool_definitions.is_empty() {
            None
        } else {
            Some(tool_definitions.as_slice())
        };

        let mut rounds = 0;
        let mut collected_tool_results: Vec<ToolExecutionResult> = Vec::new();
        let mut next_step = self.strategy.initialize_interaction(&mut state)?;

        loop {
            trace!(?next_step, "Processing next step.");
            match next_step {
                NextStep::CallApi => {
                    if rounds >= self.config.max_rounds {
                        error!(
                            limit = self.config.max_rounds,
                            "Agent reached maximum round limit."
                        );
                        return Err(LoopError::ToolLoopExceeded {
                            rounds: self.config.max_rounds,
                        });
                    }
                    rounds += 1;
                    info!(round = rounds, "Starting agent round {}.", rounds);
                    debug!(
                        provider = %self.provider.name(),
                        num_messages = state.messages.len(),
                        num_tools = tool_definitions.len(),
                        "Sending request to oracle."
                    );

                    let api_response = self.call_oracle(&state.messages, tools, cancel).await?;
                    trace!(response = %serde_json::to_string_pretty(&api_response).unwrap_or_default(), "Full API Response");
                    next_step = self.strategy.process_api_response(&mut state, api_response)?;
                }
                NextStep::CallTools(tool_calls) => {
                    if tool_calls.is_empty() {
                        return Err(LoopError::Strategy(
                            "Strategy requested tool calls, but none were given".to_string(),
                        ));
                    }
                    info!(
                        count = tool_calls.len(),
                        parallel = self.config.parallel_tool_calls,
                        "Executing {} requested tool call(s).",
                        tool_calls.len()
                    );
                    let results = self
                        .execute_tool_calls(&tool_calls, context, rounds, cancel)
                        .await?;
                    collected_tool_results.extend(results.iter().cloned());
                    next_step = self.strategy.process_tool_results(&mut state, results)?;
                }
                NextStep::Completed(final_message) => {
                    info!(rounds, "Agent run finished with a final answer.");
                    trace!(message = %final_message, "Final message.");
                    return Ok(AgentOutput {
                        final_message,
                        messages: state.messages,
                        applied_tool_results: collected_tool_results,
                        rounds,
                    });
                }
            }
        }
    }

    fn prepare_messages(&self, mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        if let Some(prompt) = &self.system_prompt {
            let has_system = messages.first().map(|m| m.role == Role::System).unwrap_or(false);
            if !has_system {
                messages.insert(0, ChatMessage::system(prompt.clone()));
            }
        }
        messages
    }

    /// One oracle call bounded by the configured timeout. A timed-out call is
    /// retried `timeout_retries` times with doubling delays; other failures
    /// are returned at once.
    async fn call_oracle(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, LoopError> {
        let timeout = self.config.oracle_timeout();
        let mut delay = self.config.timeout_retry_delay();
        let mut attempt = 0;

        loop {
            let request = self.provider.get_completion(messages.to_vec(), tools);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Run cancelled while waiting for the oracle.");
                    return Err(LoopError::Cancelled);
                }
                outcome = tokio::time::timeout(timeout, request) => outcome,
            };

            match outcome {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => {
                    error!(error = ?e, "Oracle call failed.");
                    return Err(LoopError::OracleTransportError(e));
                }
                Err(_) if attempt < self.config.timeout_retries => {
                    attempt += 1;
                    warn!(
                        "Oracle call timed out after {:?}. Retrying in {:?} (attempt {}/{})",
                        timeout, delay, attempt, self.config.timeout_retries
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LoopError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = delay.saturating_mul(2);
                }
                Err(_) => {
                    error!(timeout = ?timeout, "Oracle call timed out.");
                    return Err(LoopError::OracleTimeout(timeout));
                }
            }
        }
    }

    /// Runs every requested call and returns one result per call, in the
    /// order the oracle listed them.
    async fn execute_tool_calls(
        &self,
        tool_calls: &[ToolCall],
        context: &ExecutionContext,
        round: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolExecutionResult>, LoopError> {
        let work = async {
            if self.config.parallel_tool_calls {
                join_all(
                    tool_calls
                        .iter()
                        .map(|call| self.execute_tool_call(call, context, round)),
                )
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()
            } else {
                let mut results = Vec::with_capacity(tool_calls.len());
                for call in tool_calls {
                    results.push(self.execute_tool_call(call, context, round).await?);
                }
                Ok(results)
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Run cancelled while tools were executing.");
                Err(LoopError::Cancelled)
            }
            results = work => results,
        }
    }

    /// Recoverable failures become a failed result for the oracle to read.
    /// Anything else, such as a handler surfacing a missing context key,
    /// ends the run.
    async fn execute_tool_call(
        &self,
        tool_call: &ToolCall,
        context: &ExecutionContext,
        round: usize,
    ) -> Result<ToolExecutionResult, LoopError> {
        let tool_name = tool_call.function.name.as_str();
        debug!(tool_call_id = %tool_call.id, tool_name = %tool_name, "Processing request for tool '{}'.", tool_name);
        trace!(arguments = %tool_call.function.arguments, "Raw tool arguments for '{}'", tool_name);

        let raw_input = serde_json::from_str(&tool_call.function.arguments)
            .unwrap_or_else(|_| JsonValue::String(tool_call.function.arguments.clone()));
        let record = |output: String, status: ToolExecutionStatus| ToolExecutionResult {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_name.to_string(),
            input: raw_input.clone(),
            output,
            status,
            round,
        };

        match self.invoke_tool(tool_call, context).await {
            Ok(content) => {
                info!(tool_call_id = %tool_call.id, tool_name = %tool_name, "Tool '{}' executed successfully.", tool_name);
                trace!(output = %one_line(&content, LOG_PREVIEW_CHARS), "Output from tool '{}'", tool_name);
                Ok(record(content, ToolExecutionStatus::Success))
            }
            Err(e) if e.is_recoverable() => {
                warn!(tool_call_id = %tool_call.id, tool_name = %tool_name, error = %e, "Tool call failed; reporting back to oracle.");
                Ok(record(e.to_tool_result(), ToolExecutionStatus::Failure))
            }
            Err(e) => {
                error!(tool_call_id = %tool_call.id, tool_name = %tool_name, error = %e, "Tool call failed; aborting run.");
                Err(e)
            }
        }
    }

    async fn invoke_tool(
        &self,
        tool_call: &ToolCall,
        context: &ExecutionContext,
    ) -> Result<String, LoopError> {
        let tool_name = tool_call.function.name.as_str();
        let tool = self.registry.resolve(tool_name)?;
        let input = tool
            .definition()
            .parameters
            .validate(&tool_call.function.arguments)
            .map_err(|reason| LoopError::invalid_arguments(tool_name, reason))?;

        match tool.invoke(input, context).await {
            Ok(output) => Ok(output.into_content()),
            Err(source) => match source.downcast::<LoopError>() {
                Ok(loop_error) if !loop_error.is_recoverable() => Err(loop_error),
                Ok(loop_error) => Err(LoopError::ToolHandlerFailure {
                    tool: tool_name.to_string(),
                    source: loop_error.into(),
                }),
                Err(source) => Err(LoopError::ToolHandlerFailure {
                    tool: tool_name.to_string(),
                    source,
                }),
            },
        }
    }
}
