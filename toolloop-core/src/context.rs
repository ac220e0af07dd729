// toolloop-core/src/context.rs

//! Host-supplied execution context for tool handlers.
//!
//! The context carries facts the host knows but the model must not be asked
//! for (for example, who is making the request). It is built once per request,
//! handed to every tool invocation by shared reference, and never written into
//! the conversation transcript.

use crate::errors::LoopError;
use std::collections::BTreeMap;
use std::fmt;

/// Read-only key/value data available to tool handlers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    values: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ExecutionContextBuilder {
        ExecutionContextBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Looks up a key a handler cannot work without.
    pub fn require(&self, tool: &str, key: &str) -> Result<&str, LoopError> {
        self.get(key).ok_or_else(|| LoopError::MissingExecutionContext {
            tool: tool.to_string(),
            key: key.to_string(),
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if any context value occurs inside `text`.
    ///
    /// Empty values are ignored since they match everything.
    pub fn appears_in(&self, text: &str) -> bool {
        self.values
            .values()
            .any(|value| !value.is_empty() && text.contains(value.as_str()))
    }
}

// Values stay out of logs; only key names are printed.
impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ExecutionContextBuilder {
    values: BTreeMap<String, String>,
}

impl ExecutionContextBuilder {
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ExecutionContext {
        ExecutionContext {
            values: self.values,
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExecutionContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let ctx = ExecutionContext::builder().insert("user_id", "1").build();
        assert_eq!(ctx.get("user_id"), Some("1"));
        assert_eq!(ctx.get("tenant"), None);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["user_id"]);
    }

    #[test]
    fn test_require_reports_tool_and_key() {
        let ctx = ExecutionContext::new();
        match ctx.require("get_user_location", "user_id") {
            Err(LoopError::MissingExecutionContext { tool, key }) => {
                assert_eq!(tool, "get_user_location");
                assert_eq!(key, "user_id");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_values() {
        let ctx: ExecutionContext = [("api_token", "s3cr3t-value")].into_iter().collect();
        let printed = format!("{:?}", ctx);
        assert!(printed.contains("api_token"));
        assert!(!printed.contains("s3cr3t-value"));
    }

    #[test]
    fn test_appears_in_ignores_empty_values() {
        let ctx = ExecutionContext::builder()
            .insert("user_id", "user-7781")
            .insert("blank", "")
            .build();
        assert!(ctx.appears_in("hello user-7781"));
        assert!(!ctx.appears_in("hello world"));
    }
}
