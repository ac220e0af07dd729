// toolloop-core/src/tools/registry.rs
use super::Tool;
use crate::context::ExecutionContext;
use crate::errors::LoopError;
use crate::models::tools::ToolDefinition;
use std::collections::HashMap;
use tracing::debug;

/// The fixed set of tools offered to the oracle for a request.
///
/// Tools are kept in registration order so the declarations sent on every
/// round are identical. Build the registry at startup and share it behind an
/// `Arc`; it is never mutated while a loop is running.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Tool) -> Result<(), LoopError> {
        if self.index.contains_key(tool.name()) {
            return Err(LoopError::DuplicateToolName(tool.name().to_string()));
        }
        debug!(tool = %tool.name(), "Registering tool");
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: Tool) -> Result<Self, LoopError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn resolve(&self, name: &str) -> Result<&Tool, LoopError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| LoopError::UnknownTool(name.to_string()))
    }

    /// Declarations in registration order. Handlers are never exposed.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition().clone()).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(Tool::name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Fails with the first tool whose declared context key is absent.
    pub fn check_context(&self, context: &ExecutionContext) -> Result<(), LoopError> {
        for tool in &self.tools {
            for key in tool.context_keys() {
                if !context.contains_key(key) {
                    return Err(LoopError::MissingExecutionContext {
                        tool: tool.name().to_string(),
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
