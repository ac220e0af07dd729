// toolloop-core/src/tools/mod.rs

//! Tool declarations and the handler boundary.
//!
//! A [`Tool`] pairs the declaration the oracle sees ([`ToolDefinition`]) with
//! a local [`ToolHandler`]. Handlers receive arguments that have already been
//! validated against the declared schema, plus the request's
//! [`ExecutionContext`] by shared reference. Every handler failure is turned
//! into a tool-result error message by the loop, so handlers just return
//! `anyhow::Result`.

pub mod registry;
pub mod weather;

use crate::context::ExecutionContext;
use crate::models::tools::{ToolDefinition, ToolInput, ToolParametersDefinition};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

pub use registry::ToolRegistry;

/// What a handler hands back to the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Structured(JsonValue),
}

impl ToolOutput {
    /// Renders the output as the content of a tool-result message.
    pub fn into_content(self) -> String {
        match self {
            ToolOutput::Text(s) => s,
            ToolOutput::Structured(value) => match value {
                JsonValue::String(s) => s,
                JsonValue::Null => "<no output>".to_string(),
                JsonValue::Array(arr) if arr.is_empty() => "<empty result>".to_string(),
                other => serde_json::to_string(&other)
                    .unwrap_or_else(|_| "<invalid JSON value>".to_string()),
            },
        }
    }
}

impl From<String> for ToolOutput {
    fn from(value: String) -> Self {
        ToolOutput::Text(value)
    }
}

impl From<&str> for ToolOutput {
    fn from(value: &str) -> Self {
        ToolOutput::Text(value.to_string())
    }
}

impl From<JsonValue> for ToolOutput {
    fn from(value: JsonValue) -> Self {
        ToolOutput::Structured(value)
    }
}

/// The local implementation behind a declared tool.
///
/// Handlers must not rely on being polled to completion: a cancelled run drops
/// the in-flight future.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: ToolInput, context: &ExecutionContext) -> Result<ToolOutput>;
}

/// Adapts a synchronous closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(&ToolInput, &ExecutionContext) -> Result<ToolOutput> + Send + Sync,
{
    async fn call(&self, input: ToolInput, context: &ExecutionContext) -> Result<ToolOutput> {
        (self.0)(&input, context)
    }
}

/// A named capability: its declaration plus the handler that runs it.
#[derive(Clone)]
pub struct Tool {
    definition: ToolDefinition,
    context_keys: Vec<String>,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParametersDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            context_keys: Vec::new(),
            handler,
        }
    }

    pub fn from_fn<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParametersDefinition,
        f: F,
    ) -> Self
    where
        F: Fn(&ToolInput, &ExecutionContext) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Self::new(name, description, parameters, Arc::new(FnHandler(f)))
    }

    /// Declares that the handler reads `key` from the execution context.
    /// The loop refuses to start if a declared key is missing.
    pub fn requires_context(mut self, key: impl Into<String>) -> Self {
        self.context_keys.push(key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    pub fn context_keys(&self) -> &[String] {
        &self.context_keys
    }

    pub async fn invoke(&self, input: ToolInput, context: &ExecutionContext) -> Result<ToolOutput> {
        self.handler.call(input, context).await
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("definition", &self.definition)
            .field("context_keys", &self.context_keys)
            .finish_non_exhaustive()
    }
}
