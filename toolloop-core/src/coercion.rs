// toolloop-core/src/coercion.rs

//! Turns a free-text answer into a typed JSON record.
//!
//! This runs after the tool loop and knows nothing about it: the input is
//! opaque text, the oracle is queried without tools, and the reply must be a
//! single JSON object carrying the schema's fields.

use crate::errors::LoopError;
use crate::models::chat::ChatMessage;
use crate::models::tools::{json_type_name, ToolParameterType};
use crate::providers::Provider;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_COERCION_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub name: String,
    pub field_type: ToolParameterType,
    pub description: String,
}

/// Field name to primitive type, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    name: String,
    fields: Vec<OutputField>,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: ToolParameterType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(OutputField {
            name: name.into(),
            field_type,
            description: description.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }

    /// Checks that every field is present with the right type and returns
    /// only the declared fields.
    pub fn validate(&self, value: JsonValue) -> Result<Map<String, JsonValue>, String> {
        let mut object = match value {
            JsonValue::Object(map) => map,
            other => {
                return Err(format!(
                    "expected a JSON object, got {}",
                    json_type_name(&other)
                ))
            }
        };

        let mut record = Map::new();
        for field in &self.fields {
            let value = object
                .remove(&field.name)
                .ok_or_else(|| format!("missing field '{}'", field.name))?;
            if !field.field_type.matches(&value) {
                return Err(format!(
                    "field '{}' must be of type {}, got {}",
                    field.name,
                    field.field_type.as_str(),
                    json_type_name(&value)
                ));
            }
            record.insert(field.name.clone(), value);
        }
        if !object.is_empty() {
            debug!(
                schema = %self.name,
                dropped = ?object.keys().collect::<Vec<_>>(),
                "Dropping fields not in the output schema"
            );
        }
        Ok(record)
    }

    fn instruction(&self) -> String {
        let mut lines = vec![format!(
            "Convert the user's text into a JSON object named '{}' with exactly these fields:",
            self.name
        )];
        for field in &self.fields {
            lines.push(format!(
                "- \"{}\" ({}): {}",
                field.name,
                field.field_type.as_str(),
                field.description
            ));
        }
        lines.push("Reply with only the JSON object. Do not add prose or extra fields.".to_string());
        lines.join("\n")
    }
}

/// `{humour_response: string, weatherCondition: string}`.
pub fn weather_report_schema() -> OutputSchema {
    OutputSchema::new("WeatherReport")
        .field(
            "humour_response",
            ToolParameterType::String,
            "A short, light-hearted remark about the weather described in the text.",
        )
        .field(
            "weatherCondition",
            ToolParameterType::String,
            "The weather condition as a single capitalised word, for example Sunny, Cloudy or Rainy.",
        )
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("code fence pattern is valid")
    })
}

/// Pulls a JSON object out of an oracle reply, tolerating Markdown fences
/// and a sentence or two around the object.
pub fn extract_json(reply: &str) -> Result<JsonValue, String> {
    let candidate = match code_fence().captures(reply).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => {
            let trimmed = reply.trim();
            match (trimmed.find('{'), trimmed.rfind('}')) {
                (Some(start), Some(end)) if start < end => &trimmed[start..=end],
                _ => trimmed,
            }
        }
    };
    serde_json::from_str(candidate).map_err(|e| format!("reply is not valid JSON ({})", e))
}

/// Re-queries the oracle to reshape text into an [`OutputSchema`] record.
pub struct StructuredOutputCoercer {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    max_attempts: usize,
}

impl StructuredOutputCoercer {
    pub fn new(provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            max_attempts: DEFAULT_COERCION_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Fails with [`LoopError::SchemaCoercionFailed`] once every attempt has
    /// produced an unusable reply. Timeouts and transport failures are
    /// returned as-is without retrying; a cancelled token ends the call with
    /// [`LoopError::Cancelled`].
    pub async fn coerce(
        &self,
        text: &str,
        schema: &OutputSchema,
        cancel: &CancellationToken,
    ) -> Result<Map<String, JsonValue>, LoopError> {
        info!(schema = %schema.name(), "Coercing final answer into structured output.");
        let mut messages = vec![
            ChatMessage::system(schema.instruction()),
            ChatMessage::user(text),
        ];
        let mut last_reason = String::new();

        for attempt in 1..=self.max_attempts {
            let request = self.provider.get_completion(messages.clone(), None);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(attempt, "Coercion cancelled while waiting for the oracle.");
                    return Err(LoopError::Cancelled);
                }
                outcome = tokio::time::timeout(self.timeout, request) => outcome,
            };
            let response = match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(LoopError::OracleTransportError(e)),
                Err(_) => {
                    error!(attempt, timeout = ?self.timeout, "Coercion oracle call timed out.");
                    return Err(LoopError::OracleTimeout(self.timeout));
                }
            };

            let reply = response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();

            match extract_json(&reply).and_then(|value| schema.validate(value)) {
                Ok(record) => {
                    debug!(attempt, "Structured output accepted.");
                    return Ok(record);
                }
                Err(reason) => {
                    warn!(attempt, reason = %reason, "Structured output rejected.");
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(format!(
                        "That reply could not be used: {}. Reply again with only the JSON object.",
                        reason
                    )));
                    last_reason = reason;
                }
            }
        }

        Err(LoopError::SchemaCoercionFailed {
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}
