//! Tool parameter schemas
//!
//! A schema is an ordered list of named parameters, each with a JSON type.
//! Adapters render it to JSON Schema; tools validate incoming arguments
//! against it before running.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::{AgentError, AgentResult};

/// JSON type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Check whether a JSON value is acceptable for this type.
    ///
    /// Integers are accepted where a number is declared.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rust types that map onto a JSON parameter type
pub trait ToolParam {
    const TYPE: ParamType;
    /// Element type, for arrays
    const ITEMS: Option<ParamType> = None;
}

macro_rules! tool_param {
    ($kind:expr => $($ty:ty),+) => {
        $(impl ToolParam for $ty {
            const TYPE: ParamType = $kind;
        })+
    };
}

tool_param!(ParamType::String => String, &str);
tool_param!(ParamType::Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
tool_param!(ParamType::Number => f32, f64);
tool_param!(ParamType::Boolean => bool);
tool_param!(ParamType::Object => Map<String, Value>);

impl<T: ToolParam> ToolParam for Vec<T> {
    const TYPE: ParamType = ParamType::Array;
    const ITEMS: Option<ParamType> = Some(T::TYPE);
}

/// A single declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Element type of an array parameter. Strings when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParamType>,
}

fn default_required() -> bool {
    true
}

fn kind_schema(kind: ParamType) -> Value {
    match kind {
        ParamType::Array => json!({ "type": "array", "items": { "type": "string" } }),
        ParamType::Object => json!({
            "type": "object",
            "properties": {},
            "additionalProperties": true,
        }),
        other => json!({ "type": other.as_str() }),
    }
}

impl Parameter {
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            items: None,
        }
    }

    /// Declare a parameter from a Rust type, carrying its element type
    pub fn of<T: ToolParam>(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            required,
            items: T::ITEMS,
            ..Self::required(name, T::TYPE, description)
        }
    }

    pub fn with_items(mut self, items: ParamType) -> Self {
        self.items = Some(items);
        self
    }

    /// JSON Schema of this parameter's value
    pub fn type_schema(&self) -> Value {
        let mut prop = kind_schema(self.kind);
        if self.kind == ParamType::Array {
            prop["items"] = kind_schema(self.items.unwrap_or(ParamType::String));
        }
        if !self.description.is_empty() {
            prop["description"] = json!(self.description);
        }
        prop
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Ordered parameter schema of a tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    params: Vec<Parameter>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter. Duplicate names are rejected.
    pub fn push(&mut self, param: Parameter) -> AgentResult<()> {
        if param.name.trim().is_empty() {
            return Err(AgentError::configuration("parameter name must not be empty"));
        }
        if self.get(&param.name).is_some() {
            return Err(AgentError::configuration(format!(
                "parameter '{}' declared twice",
                param.name
            )));
        }
        self.params.push(param);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Render as a JSON Schema object
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            properties.insert(param.name.clone(), param.type_schema());
            if param.required {
                required.push(json!(param.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate call arguments: every required parameter present, every
    /// supplied value of the declared type, nothing undeclared.
    pub fn validate(&self, tool: &str, args: &Map<String, Value>) -> AgentResult<()> {
        for param in &self.params {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::tool_invocation(
                        tool,
                        format!("missing required argument '{}'", param.name),
                    ));
                }
                Some(value) if !value.is_null() && !param.kind.matches(value) => {
                    return Err(AgentError::tool_invocation(
                        tool,
                        format!(
                            "argument '{}' must be of type {}, got {}",
                            param.name, param.kind, value
                        ),
                    ));
                }
                _ => {}
            }
        }

        if let Some(unknown) = args.keys().find(|k| self.get(k).is_none()) {
            return Err(AgentError::tool_invocation(
                tool,
                format!("unexpected argument '{}'", unknown),
            ));
        }
        Ok(())
    }
}

impl FromIterator<Parameter> for ParameterSchema {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut schema = ParameterSchema::new();
        for param in iter {
            if schema.get(&param.name).is_none() {
                schema.params.push(param);
            }
        }
        schema
    }
}

/// Interpret raw call arguments as an object map
pub fn argument_object<'a>(tool: &str, arguments: &'a Value) -> AgentResult<&'a Map<String, Value>> {
    arguments.as_object().ok_or_else(|| {
        AgentError::tool_invocation(
            tool,
            format!("arguments must be a JSON object, got {}", arguments),
        )
    })
}
