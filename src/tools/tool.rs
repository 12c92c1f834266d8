//! Tool trait definition
//!
//! All tools implement this trait to provide a consistent interface. A tool
//! either produces text for the model or hands the run over to another agent.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::schema::ParameterSchema;
use crate::agent::AgentRef;
use crate::core::{AgentError, AgentResult};
use crate::llm::ToolDefinition;

/// Agent that takes over after a handoff
#[derive(Debug, Clone)]
pub enum HandoffTarget {
    /// A concrete agent instance
    Agent(AgentRef),
    /// An agent registered in the manager under this name
    Named(String),
}

impl HandoffTarget {
    /// Name of the target agent
    pub fn name(&self) -> &str {
        match self {
            HandoffTarget::Agent(agent) => agent.name(),
            HandoffTarget::Named(name) => name,
        }
    }
}

/// Request to make another agent the active one
#[derive(Debug, Clone)]
pub struct Handoff {
    pub target: HandoffTarget,
    /// Replacement instruction applied to the target before it is queried
    pub instruction: Option<String>,
}

impl Handoff {
    /// Hand off to a concrete agent
    pub fn to(agent: AgentRef) -> Self {
        Self {
            target: HandoffTarget::Agent(agent),
            instruction: None,
        }
    }

    /// Hand off to an agent resolved by name at dispatch time
    pub fn to_named(name: impl Into<String>) -> Self {
        Self {
            target: HandoffTarget::Named(name.into()),
            instruction: None,
        }
    }

    /// Rewrite the target's instruction as part of the handoff
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }
}

/// Result of invoking a tool
#[derive(Debug, Clone)]
pub enum ToolOutput {
    /// Text returned to the model as the tool result
    Content(String),
    /// Switch the active agent
    Handoff(Handoff),
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        ToolOutput::Content(content.into())
    }

    pub fn is_handoff(&self) -> bool {
        matches!(self, ToolOutput::Handoff(_))
    }
}

impl From<String> for ToolOutput {
    fn from(content: String) -> Self {
        ToolOutput::Content(content)
    }
}

impl From<&str> for ToolOutput {
    fn from(content: &str) -> Self {
        ToolOutput::Content(content.to_string())
    }
}

impl From<Handoff> for ToolOutput {
    fn from(handoff: Handoff) -> Self {
        ToolOutput::Handoff(handoff)
    }
}

impl From<AgentRef> for ToolOutput {
    fn from(agent: AgentRef) -> Self {
        ToolOutput::Handoff(Handoff::to(agent))
    }
}

macro_rules! display_output {
    ($($ty:ty),+) => {
        $(impl From<$ty> for ToolOutput {
            fn from(value: $ty) -> Self {
                ToolOutput::Content(value.to_string())
            }
        })+
    };
}

display_output!(i32, i64, u32, u64, usize, f32, f64, bool);

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ToolOutput::Content(s),
            other => ToolOutput::Content(other.to_string()),
        }
    }
}

/// Trait for tools that an agent can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of this tool
    fn name(&self) -> &str;

    /// Get a description of this tool
    fn description(&self) -> &str;

    /// Declared parameters
    fn parameters(&self) -> &ParameterSchema;

    /// Provider-agnostic definition handed to model adapters
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters().clone())
    }

    /// Invoke the tool with the arguments supplied by the model
    async fn invoke(&self, arguments: &Map<String, Value>) -> AgentResult<ToolOutput>;

    /// Whether an invocation error should end the run instead of being
    /// reported back to the model
    fn fatal_on_error(&self) -> bool {
        false
    }
}

/// Check a tool name against what every provider accepts
pub fn validate_tool_name(name: &str) -> AgentResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AgentError::configuration(format!(
            "invalid tool name '{}': use 1-64 letters, digits, '_' or '-'",
            name
        )))
    }
}
