//! Agent definition
//!
//! An agent is a name, a mutable instruction, a model adapter and a tool set.
//! Agents are shared as `AgentRef` so tools can hand off to them and several
//! runs can use them at once.

use std::sync::{Arc, RwLock};

use crate::core::{AgentError, AgentResult};
use crate::llm::{ModelAdapter, ToolDefinition};
use crate::tools::{Tool, ToolRegistry};

/// Shared handle to an agent
pub type AgentRef = Arc<Agent>;

/// A named LLM persona with its own instruction, model and tools
///
/// ```ignore
/// let agent = Agent::builder("calculator")
///     .instruction("You are a calculator. Use tools for arithmetic.")
///     .model(OpenAiAdapter::new(api_key, "gpt-4o-mini")?)
///     .tool(multiply)
///     .build()?;
/// ```
pub struct Agent {
    name: String,
    /// Rewritten in place by handoffs. Concurrent runs that hand off to the
    /// same agent race on this value.
    instruction: RwLock<String>,
    model: Arc<dyn ModelAdapter>,
    tools: ToolRegistry,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            instruction: String::new(),
            model: None,
            tools: ToolRegistry::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current instruction
    pub fn instruction(&self) -> String {
        self.instruction
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the instruction
    pub fn set_instruction(&self, instruction: impl Into<String>) {
        let mut guard = self
            .instruction
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = instruction.into();
    }

    pub fn model(&self) -> &Arc<dyn ModelAdapter> {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.tool_names()
    }

    /// Tool definitions handed to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// One-line summary for logs and listings
    pub fn describe(&self) -> String {
        format!(
            "{} ({} {}, {} tools): {}",
            self.name,
            self.model.provider_name(),
            self.model.model(),
            self.tools.len(),
            self.instruction()
        )
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field(
                "instruction",
                &format!("{}...", self.instruction().chars().take(50).collect::<String>()),
            )
            .field("provider", &self.model.provider_name())
            .field("model", &self.model.model())
            .field("tools", &self.tools)
            .finish()
    }
}

/// Builder for `Agent`
pub struct AgentBuilder {
    name: String,
    instruction: String,
    model: Option<Arc<dyn ModelAdapter>>,
    tools: ToolRegistry,
    error: Option<AgentError>,
}

impl AgentBuilder {
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn model<M: ModelAdapter + 'static>(self, model: M) -> Self {
        self.model_arc(Arc::new(model))
    }

    /// Use a shared adapter, e.g. one produced by `build_adapter`
    pub fn model_arc(mut self, model: Arc<dyn ModelAdapter>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tool<T: Tool + 'static>(self, tool: T) -> Self {
        self.tool_arc(Arc::new(tool))
    }

    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.tools.register_arc(tool) {
                self.error = Some(AgentError::configuration(format!(
                    "agent '{}': {}",
                    self.name, e
                )));
            }
        }
        self
    }

    pub fn build(self) -> AgentResult<AgentRef> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.name.trim().is_empty() {
            return Err(AgentError::configuration("agent name must not be empty"));
        }
        let model = self.model.ok_or_else(|| {
            AgentError::configuration(format!("agent '{}' has no model adapter", self.name))
        })?;

        Ok(Arc::new(Agent {
            name: self.name,
            instruction: RwLock::new(self.instruction),
            model,
            tools: self.tools,
        }))
    }
}
