// toolloop-core/src/api/mod.rs

//! HTTP plumbing for OpenAI-compatible `/chat/completions` endpoints.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, to_value, Value};
use tokio::time::Duration;
use toml::Value as TomlValue;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::models::chat::{ApiResponse, ChatMessage, Choice, Role};
use crate::models::tools::{ToolCall, ToolDefinition, ToolFunction};

const BACKOFF_FACTOR: f64 = 2.0;

/// Posts a chat completion request, retrying rate limits, server errors and
/// network failures with exponential backoff.
#[allow(clippy::too_many_arguments)]
pub async fn call_chat_completion_api(
    http_client: &Client,
    endpoint: &str,
    api_key: &str,
    model_name: &str,
    messages: Vec<ChatMessage>,
    tools: Option<&[ToolDefinition]>,
    parameters: Option<&TomlValue>,
    retry: &RetryConfig,
) -> Result<ApiResponse> {
    let request_body = build_openai_request(model_name, messages, tools, parameters)?;

    debug!(endpoint = %endpoint, model = %model_name, "Sending chat completion request");
    trace!(body = %serde_json::to_string_pretty(&request_body).unwrap_or_default(), "Request JSON");

    let mut retries = 0;
    let mut current_delay = retry.initial_delay();

    loop {
        let mut request = http_client
            .post(endpoint)
            .header("Content-Type", "application/json");
        if !api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = match request.json(&request_body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                if retries < retry.max_retries {
                    retries += 1;
                    warn!(
                        "Network error sending request: {}. Retrying in {:?} (attempt {}/{})",
                        e, current_delay, retries, retry.max_retries
                    );
                    tokio::time::sleep(current_delay).await;
                    current_delay = next_delay(current_delay, retry.max_delay());
                    continue;
                }
                return Err(anyhow!(
                    "Network error after {} retries: {}",
                    retry.max_retries,
                    e
                ));
            }
        };

        let status = response.status();

        if (status.as_u16() == 429 || status.is_server_error()) && retries < retry.max_retries {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);

            let wait_time = retry_after.unwrap_or(current_delay).min(retry.max_delay());
            retries += 1;
            warn!(
                "API request failed with status {}. Retrying in {:?} (attempt {}/{})",
                status, wait_time, retries, retry.max_retries
            );
            tokio::time::sleep(wait_time).await;
            current_delay = next_delay(current_delay, retry.max_delay());
            continue;
        }

        let response_text = response
            .text()
            .await
            .context("Failed to read API response body")?;

        if !status.is_success() {
            debug!(status = %status, body = %response_text, "API request failed");
            return Err(anyhow!("API error: {} - {}", status, response_text));
        }

        let api_response = parse_openai_response(&response_text)?;
        debug!(
            id = %api_response.id,
            choices = api_response.choices.len(),
            "Received chat completion response"
        );
        return Ok(api_response);
    }
}

fn next_delay(current: Duration, max: Duration) -> Duration {
    std::cmp::min(
        Duration::from_secs_f64(current.as_secs_f64() * BACKOFF_FACTOR),
        max,
    )
}

/// Builds the JSON request body. Sampling parameters from the model config
/// (temperature, max_tokens, ...) are copied verbatim into the top level.
pub fn build_openai_request(
    model_name: &str,
    messages: Vec<ChatMessage>,
    tools: Option<&[ToolDefinition]>,
    parameters: Option<&TomlValue>,
) -> Result<Value> {
    let mut request_map = serde_json::Map::new();
    request_map.insert("model".to_string(), json!(model_name));
    request_map.insert("messages".to_string(), to_value(messages)?);

    if let Some(tools) = tools {
        if !tools.is_empty() {
            let tools_json: Vec<Value> = tools
                .iter()
                .map(|tool_def| {
                    json!({
                        "type": "function",
                        "function": tool_def
                    })
                })
                .collect();
            request_map.insert("tools".to_string(), Value::Array(tools_json));
        }
    }

    if let Some(table) = parameters.and_then(TomlValue::as_table) {
        for (key, value) in table {
            let json_value = to_value(value.clone())
                .with_context(|| format!("Failed to convert TOML parameter '{}' to JSON", key))?;
            request_map.insert(key.clone(), json_value);
        }
    }
    Ok(Value::Object(request_map))
}

/// Parses an OpenAI-style response body into an [`ApiResponse`].
///
/// Tolerates gateways that omit `id`, send `null` content or finish reasons,
/// or encode tool arguments as a JSON object instead of a string.
pub fn parse_openai_response(response_body: &str) -> Result<ApiResponse> {
    let raw_response: Value = serde_json::from_str(response_body)
        .with_context(|| format!("Failed to parse API response as JSON: {}", response_body))?;

    let response_id = raw_response
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let new_id = format!("chatcmpl-{}", Uuid::new_v4());
            debug!("Added missing 'id' field to API response with value: {}", new_id);
            new_id
        });

    let choices_array = raw_response
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("API response has no 'choices' array: {}", response_body))?;

    let mut choices = Vec::with_capacity(choices_array.len());
    for (position, choice) in choices_array.iter().enumerate() {
        let message = choice
            .get("message")
            .ok_or_else(|| anyhow!("Choice {} has no 'message'", position))?;
        let role = match message.get("role").and_then(Value::as_str) {
            Some("system") => Role::System,
            Some("user") => Role::User,
            Some("tool") => Role::Tool,
            _ => Role::Assistant,
        };
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string);
        let tool_calls = match message.get("tool_calls").and_then(Value::as_array) {
            Some(calls) => Some(
                calls
                    .iter()
                    .enumerate()
                    .map(|(i, call)| parse_tool_call(call, i))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        let finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let index = choice
            .get("index")
            .and_then(Value::as_u64)
            .unwrap_or(position as u64) as u32;

        choices.push(Choice {
            index,
            message: ChatMessage {
                role,
                content,
                tool_calls,
                tool_call_id: None,
                name: None,
            },
            finish_reason,
        });
    }

    Ok(ApiResponse {
        id: response_id,
        choices,
    })
}

fn parse_tool_call(call: &Value, position: usize) -> Result<ToolCall> {
    let function = call
        .get("function")
        .ok_or_else(|| anyhow!("Tool call {} has no 'function'", position))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Tool call {} has no function name", position))?;
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
    Ok(ToolCall {
        id,
        call_type: "function".to_string(),
        function: ToolFunction {
            name: name.to_string(),
            arguments,
        },
    })
}

#[cfg(test)]
mod tests;
