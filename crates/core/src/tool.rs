//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! do arithmetic, look up the weather, fetch stock prices, inspect disks.
//! Each tool declares an ordered, typed parameter schema; the registry
//! holds them by name for the lifetime of the process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::action::Arguments;
use crate::error::ToolError;

/// The semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParameterKind {
    /// JSON-Schema name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }

    /// Convert a loosely-typed value into this kind.
    fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),

            (Self::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(value.clone())
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| Value::from(f as i64))
                }
            }
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            _ => None,
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Parameter {
    pub fn required(name: impl Into<String>, kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    /// Value filled in when the model omits this parameter.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// The ordered parameter list of a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    parameters: Vec<Parameter>,
}

impl ParameterSchema {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The first declared parameter; scalar `action_input`s bind to it.
    pub fn first(&self) -> Option<&Parameter> {
        self.parameters.first()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// JSON-Schema style `properties` object, as shown to the model.
    ///
    /// Properties appear in declared order, so the first one listed is the
    /// one a scalar `action_input` binds to.
    pub fn to_json_schema(&self) -> String {
        let properties: Vec<String> = self
            .parameters
            .iter()
            .map(|param| {
                let mut property = serde_json::Map::new();
                property.insert("type".into(), Value::String(param.kind.as_str().into()));
                property.insert("description".into(), Value::String(param.description.clone()));
                property.insert("required".into(), Value::Bool(param.required));
                if let Some(default) = &param.default {
                    property.insert("default".into(), default.clone());
                }
                format!("{}:{}", Value::String(param.name.clone()), Value::Object(property))
            })
            .collect();
        format!("{{{}}}", properties.join(","))
    }

    /// Convert model-supplied values to their declared kinds.
    ///
    /// Names the schema does not declare pass through unchanged, and `null`
    /// for an optional parameter is treated as absent. Presence and unknown
    /// names are checked later by [`validate`](Self::validate).
    pub fn coerce(&self, tool_name: &str, raw: &Arguments) -> Result<Arguments, ToolError> {
        let mut coerced = Arguments::new();
        for (name, value) in raw {
            let Some(param) = self.get(name) else {
                coerced.insert(name.clone(), value.clone());
                continue;
            };
            if value.is_null() {
                if param.required {
                    coerced.insert(name.clone(), Value::Null);
                }
                continue;
            }
            let converted = param.kind.coerce(value).ok_or_else(|| ToolError::InvalidArguments {
                tool_name: tool_name.to_string(),
                reason: format!(
                    "parameter '{}' expects {}, got {}",
                    name,
                    param.kind.as_str(),
                    value
                ),
            })?;
            coerced.insert(name.clone(), converted);
        }
        Ok(coerced)
    }

    /// Check an argument set against the schema and fill declared defaults.
    pub fn validate(&self, tool_name: &str, arguments: &Arguments) -> Result<Arguments, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason,
        };

        if let Some(unknown) = arguments.keys().find(|name| self.get(name).is_none()) {
            let expected: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
            return Err(invalid(format!(
                "unexpected parameter '{}' (expected: {})",
                unknown,
                expected.join(", ")
            )));
        }

        let mut validated = Arguments::new();
        for param in &self.parameters {
            match arguments.get(&param.name).filter(|v| !v.is_null()) {
                Some(value) if param.kind.matches(value) => {
                    validated.insert(param.name.clone(), value.clone());
                }
                Some(value) => {
                    return Err(invalid(format!(
                        "parameter '{}' expects {}, got {}",
                        param.name,
                        param.kind.as_str(),
                        value
                    )));
                }
                None => {
                    if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(invalid(format!(
                            "missing required parameter '{}'",
                            param.name
                        )));
                    }
                }
            }
        }
        Ok(validated)
    }
}

/// What a tool hands back on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Structured(value) => write!(f, "{value}"),
        }
    }
}

/// A tool's name, description and schema, as rendered into prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// The core Tool trait.
///
/// Each tool (calculator, get_weather, fetch_stock_price, get_disk_usage)
/// implements this trait. Tools are registered in the [`ToolRegistry`] and
/// made available to the agent loop. Failures returned from `invoke` are fed
/// back to the model as observations, never raised to the user.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The ordered, typed parameters this tool accepts.
    fn parameters(&self) -> ParameterSchema;

    /// Execute the tool with arguments already validated against `parameters()`.
    async fn invoke(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError>;

    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A registry of available tools.
///
/// Populated once at startup and then shared read-only across runs.
/// Registration order is preserved for prompt rendering.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Fails if a tool with the same name is present.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn lookup(&self, name: &str) -> Result<&dyn Tool, ToolError> {
        self.index
            .get(name)
            .map(|&i| self.tools[i].as_ref())
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Describe every tool, in registration order.
    pub fn describe_all(&self) -> Vec<ToolDescription> {
        self.tools.iter().map(|t| t.describe()).collect()
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
