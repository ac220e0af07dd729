// toolloop-core/src/models/tools.rs
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

// --- Structs for AI Tool Interaction ---

/// Represents a tool call requested by the AI model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // Usually "function"
    pub function: ToolFunction,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: ToolFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Represents the function call details within a ToolCall.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolFunction {
    pub name: String,
    /// Arguments are expected to be a JSON string by the AI model
    pub arguments: String,
}

// --- Tool Definition and Input ---

/// Defines the schema for a tool that can be presented to the AI.
/// This is everything the oracle sees about a tool; handlers stay local.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParametersDefinition,
}

/// Defines the parameters structure for a tool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParametersDefinition {
    #[serde(rename = "type")]
    pub param_type: String,
    pub properties: BTreeMap<String, ToolParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for ToolParametersDefinition {
    fn default() -> Self {
        Self {
            param_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl ToolParametersDefinition {
    /// A schema that accepts no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_param(
        mut self,
        name: &str,
        param_type: ToolParameterType,
        description: &str,
        required: bool,
    ) -> Self {
        self.properties.insert(
            name.to_string(),
            ToolParameter {
                param_type,
                description: description.to_string(),
                enum_values: None,
                items: None,
            },
        );
        if required && !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    /// Parses the raw JSON argument string produced by the oracle and checks
    /// it against this schema.
    ///
    /// An empty string or `null` is accepted as "no arguments". Every
    /// required field must be present and non-null, every supplied field must
    /// be declared, and each value must match its declared primitive type.
    pub fn validate(&self, raw_arguments: &str) -> Result<ToolInput, String> {
        let trimmed = raw_arguments.trim();
        let value: JsonValue = if trimmed.is_empty() {
            JsonValue::Object(Default::default())
        } else {
            serde_json::from_str(trimmed)
                .map_err(|e| format!("arguments are not valid JSON ({})", e))?
        };
        let object = match value {
            JsonValue::Object(map) => map,
            JsonValue::Null => Default::default(),
            other => {
                return Err(format!(
                    "arguments must be a JSON object, got {}",
                    json_type_name(&other)
                ))
            }
        };

        for name in &self.required {
            match object.get(name) {
                None | Some(JsonValue::Null) => {
                    return Err(format!("missing required field '{}'", name))
                }
                Some(_) => {}
            }
        }

        let mut arguments = HashMap::new();
        for (key, value) in object {
            let param = self
                .properties
                .get(&key)
                .ok_or_else(|| format!("unexpected field '{}'", key))?;
            if value.is_null() {
                // Optional field explicitly sent as null; treat as absent.
                continue;
            }
            param.check(&key, &value)?;
            arguments.insert(key, value);
        }
        Ok(ToolInput { arguments })
    }
}

/// Defines a single parameter within a tool's schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolParameter>>,
}

impl ToolParameter {
    fn check(&self, name: &str, value: &JsonValue) -> Result<(), String> {
        if !self.param_type.matches(value) {
            return Err(format!(
                "field '{}' must be of type {}, got {}",
                name,
                self.param_type.as_str(),
                json_type_name(value)
            ));
        }
        if let (Some(allowed), Some(s)) = (&self.enum_values, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                return Err(format!(
                    "field '{}' must be one of [{}], got '{}'",
                    name,
                    allowed.join(", "),
                    s
                ));
            }
        }
        if let (Some(item_schema), Some(items)) = (&self.items, value.as_array()) {
            for (i, item) in items.iter().enumerate() {
                item_schema.check(&format!("{}[{}]", name, i), item)?;
            }
        }
        Ok(())
    }
}

/// Represents the type of a tool parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ToolParameterType {
    pub fn matches(&self, value: &JsonValue) -> bool {
        match self {
            ToolParameterType::String => value.is_string(),
            ToolParameterType::Integer => value.is_i64() || value.is_u64(),
            ToolParameterType::Number => value.is_number(),
            ToolParameterType::Boolean => value.is_boolean(),
            ToolParameterType::Array => value.is_array(),
            ToolParameterType::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolParameterType::String => "string",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Number => "number",
            ToolParameterType::Boolean => "boolean",
            ToolParameterType::Array => "array",
            ToolParameterType::Object => "object",
        }
    }
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_f64() => "number",
        JsonValue::Number(_) => "integer",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Represents the validated input arguments for a tool execution.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ToolInput {
    pub arguments: HashMap<String, JsonValue>,
}

impl ToolInput {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_schema() -> ToolParametersDefinition {
        ToolParametersDefinition::empty()
            .with_param("city", ToolParameterType::String, "City name", true)
            .with_param("days", ToolParameterType::Integer, "Forecast days", false)
    }

    #[test]
    fn test_validate_accepts_required_and_optional() {
        let input = weather_schema()
            .validate(r#"{"city": "Paris", "days": 3}"#)
            .unwrap();
        assert_eq!(input.get_str("city"), Some("Paris"));
        assert_eq!(input.arguments["days"], json!(3));
    }

    #[test]
    fn test_validate_missing_required_field() {
        let err = weather_schema().validate(r#"{"days": 3}"#).unwrap_err();
        assert!(err.contains("missing required field 'city'"), "{}", err);

        let err = weather_schema().validate(r#"{"city": null}"#).unwrap_err();
        assert!(err.contains("'city'"), "{}", err);
    }

    #[test]
    fn test_validate_type_mismatch_and_unknown_field() {
        let err = weather_schema().validate(r#"{"city": 42}"#).unwrap_err();
        assert!(err.contains("must be of type string"), "{}", err);

        let err = weather_schema()
            .validate(r#"{"city": "Rome", "days": 1.5}"#)
            .unwrap_err();
        assert!(err.contains("type integer"), "{}", err);

        let err = weather_schema()
            .validate(r#"{"city": "Rome", "units": "metric"}"#)
            .unwrap_err();
        assert!(err.contains("unexpected field 'units'"), "{}", err);
    }

    #[test]
    fn test_validate_empty_arguments_for_no_arg_tool() {
        let schema = ToolParametersDefinition::empty();
        assert!(schema.validate("").unwrap().arguments.is_empty());
        assert!(schema.validate("{}").unwrap().arguments.is_empty());
        assert!(schema.validate("null").unwrap().arguments.is_empty());
        assert!(schema.validate("[1]").is_err());
        assert!(schema.validate("{not json").is_err());
    }

    #[test]
    fn test_enum_values_enforced() {
        let mut schema = ToolParametersDefinition::empty().with_param(
            "unit",
            ToolParameterType::String,
            "Unit",
            true,
        );
        schema.properties.get_mut("unit").unwrap().enum_values =
            Some(vec!["celsius".to_string(), "fahrenheit".to_string()]);
        assert!(schema.validate(r#"{"unit": "celsius"}"#).is_ok());
        assert!(schema.validate(r#"{"unit": "kelvin"}"#).is_err());
    }

    #[test]
    fn test_definition_serializes_openai_shape() {
        let def = ToolDefinition {
            name: "get_weather".to_string(),
            description: "Weather lookup".to_string(),
            parameters: weather_schema(),
        };
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["parameters"]["type"], "object");
        assert_eq!(value["parameters"]["properties"]["city"]["type"], "string");
        assert_eq!(value["parameters"]["required"], json!(["city"]));
    }
}
