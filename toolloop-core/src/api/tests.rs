use super::*;
use crate::models::tools::{ToolParameterType, ToolParametersDefinition};
use httpmock::prelude::*;

fn create_mock_tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "mock_tool".to_string(),
        description: "A mock tool".to_string(),
        parameters: ToolParametersDefinition::empty().with_param(
            "arg1",
            ToolParameterType::String,
            "Arg 1",
            true,
        ),
    }]
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay_ms: 1,
        max_delay_ms: 5,
    }
}

// --- build_openai_request ---

#[test]
fn test_build_openai_request_basic() {
    let messages = vec![ChatMessage::user("Hello")];
    let tools = create_mock_tool_definitions();
    let value = build_openai_request("gpt-basic", messages.clone(), Some(&tools), None).unwrap();
    assert_eq!(value["model"], "gpt-basic");
    assert_eq!(value["messages"], json!(messages));
    assert_eq!(value["messages"][0]["role"], "user");
    assert_eq!(value["tools"][0]["type"], "function");
    assert_eq!(value["tools"][0]["function"]["name"], "mock_tool");
    assert_eq!(
        value["tools"][0]["function"]["parameters"]["required"],
        json!(["arg1"])
    );
}

#[test]
fn test_build_openai_request_no_tools() {
    let messages = vec![ChatMessage::user("Hi")];
    let value = build_openai_request("gpt-no-tools", messages.clone(), Some(&[]), None).unwrap();
    assert!(value.get("tools").is_none());
    let value = build_openai_request("gpt-no-tools", messages, None, None).unwrap();
    assert!(value.get("tools").is_none());
}

#[test]
fn test_build_openai_request_with_parameters() {
    let mut params = toml::value::Table::new();
    params.insert("temperature".to_string(), toml::Value::Float(0.9));
    params.insert("max_tokens".to_string(), toml::Value::Integer(256));
    let params = toml::Value::Table(params);
    let value = build_openai_request(
        "gpt-params",
        vec![ChatMessage::user("Test")],
        None,
        Some(&params),
    )
    .unwrap();
    assert_eq!(value["temperature"], json!(0.9));
    assert_eq!(value["max_tokens"], json!(256));
}

// --- parse_openai_response ---

#[test]
fn test_parse_response_with_tool_calls() {
    let body = json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "get_weather", "arguments": "{\"city\":\"Paris\"}" }
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
    .to_string();
    let response = parse_openai_response(&body).unwrap();
    assert_eq!(response.id, "chatcmpl-1");
    let message = &response.choices[0].message;
    assert_eq!(message.role, Role::Assistant);
    assert!(message.content.is_none());
    let calls = message.tool_calls.as_ref().unwrap();
    assert_eq!(calls[0], ToolCall::function("call_1", "get_weather", "{\"city\":\"Paris\"}"));
    assert_eq!(response.choices[0].finish_reason, "tool_calls");
}

#[test]
fn test_parse_response_tolerates_gateway_quirks() {
    let body = json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "tool_calls": [{
                    "function": { "name": "get_weather", "arguments": { "city": "Rome" } }
                }]
            },
            "finish_reason": null
        }]
    })
    .to_string();
    let response = parse_openai_response(&body).unwrap();
    assert!(response.id.starts_with("chatcmpl-"));
    let call = &response.choices[0].message.tool_calls.as_ref().unwrap()[0];
    assert!(call.id.starts_with("call_"));
    let args: Value = serde_json::from_str(&call.function.arguments).unwrap();
    assert_eq!(args, json!({ "city": "Rome" }));
    assert_eq!(response.choices[0].finish_reason, "");
}

#[test]
fn test_parse_response_rejects_garbage() {
    assert!(parse_openai_response("not json").is_err());
    assert!(parse_openai_response("{\"id\": \"x\"}").is_err());
}

// --- call_chat_completion_api ---

#[tokio::test]
async fn test_call_chat_completion_success() {
    let server = MockServer::start_async().await;
    let endpoint_path = "/v1/chat/completions";
    let endpoint = format!("{}{}", server.base_url(), endpoint_path);
    let messages = vec![ChatMessage::user("Ping")];
    let tools = create_mock_tool_definitions();
    let expected_body = build_openai_request("test-model", messages.clone(), Some(&tools), None).unwrap();

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(endpoint_path)
                .header("authorization", "Bearer test-key")
                .json_body(expected_body);
            then.status(200).json_body(json!({
                "id": "chatcmpl-123",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Pong"}, "finish_reason": "stop"}]
            }));
        })
        .await;

    let client = Client::new();
    let result = call_chat_completion_api(
        &client,
        &endpoint,
        "test-key",
        "test-model",
        messages,
        Some(&tools),
        None,
        &fast_retry(0),
    )
    .await;
    mock.assert_async().await;
    let response = result.expect("call should succeed");
    assert_eq!(response.id, "chatcmpl-123");
    assert_eq!(response.choices[0].message.content.as_deref(), Some("Pong"));
}

#[tokio::test]
async fn test_call_chat_completion_retries_server_errors_then_fails() {
    let server = MockServer::start_async().await;
    let endpoint = server.url("/v1/chat/completions");
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(500).body("Server error");
        })
        .await;

    let client = Client::new();
    let result = call_chat_completion_api(
        &client,
        &endpoint,
        "",
        "test-model",
        vec![ChatMessage::user("Retry")],
        None,
        None,
        &fast_retry(2),
    )
    .await;
    assert_eq!(mock.hits_async().await, 3);
    let err = result.unwrap_err().to_string();
    assert!(err.contains("API error: 500"), "{}", err);
}

#[tokio::test]
async fn test_call_chat_completion_client_error_not_retried() {
    let server = MockServer::start_async().await;
    let endpoint = server.url("/v1/chat/completions");
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(401).body("bad key");
        })
        .await;

    let client = Client::new();
    let result = call_chat_completion_api(
        &client,
        &endpoint,
        "wrong",
        "test-model",
        vec![ChatMessage::user("Hi")],
        None,
        None,
        &fast_retry(3),
    )
    .await;
    assert_eq!(mock.hits_async().await, 1);
    assert!(result.unwrap_err().to_string().contains("401"));
}
