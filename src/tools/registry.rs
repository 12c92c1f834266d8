//! Tool registry for an agent
//!
//! Holds the agent's tools in declaration order. Names are unique; a duplicate
//! is a configuration error.

use std::sync::Arc;

use super::schema::argument_object;
use super::tool::{Tool, ToolOutput};
use crate::core::{AgentError, AgentResult};
use crate::llm::{ToolCall, ToolDefinition};

/// Ordered set of tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> AgentResult<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> AgentResult<()> {
        let name = tool.name().to_string();
        if self.get(&name).is_some() {
            return Err(AgentError::configuration(format!(
                "duplicate tool name '{}'",
                name
            )));
        }
        tracing::debug!("Registering tool: {}", name);
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Tool definitions in declaration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Invoke the tool named by `call`
    ///
    /// Unknown tools and non-object arguments are invocation errors so the
    /// model can correct itself.
    pub async fn invoke(&self, call: &ToolCall) -> AgentResult<ToolOutput> {
        let tool = self.get(&call.name).ok_or_else(|| {
            AgentError::tool_invocation(&call.name, format!("unknown tool '{}'", call.name))
        })?;
        let arguments = argument_object(&call.name, &call.arguments)?;

        tracing::info!("Executing tool: {}", call.name);
        tracing::debug!("Input: {}", call.arguments);

        tool.invoke(arguments).await
    }

    /// Whether a failure of the named tool ends the run
    pub fn is_fatal_on_error(&self, name: &str) -> bool {
        self.get(name).map(|t| t.fatal_on_error()).unwrap_or(false)
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tool_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FunctionTool;
    use serde_json::json;

    fn echo(name: &str) -> FunctionTool {
        FunctionTool::builder(name, "Echo the text")
            .param::<String>("text", "Text to echo")
            .sync_handler(|args| args.get::<String>("text"))
            .unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected_and_order_kept() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("b")).unwrap();
        registry.register(echo("a")).unwrap();
        let err = registry.register(echo("a")).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(registry.tool_names(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_invoke_unknown_and_bad_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("echo")).unwrap();

        let err = registry
            .invoke(&ToolCall::new("1", "missing", json!({})))
            .await
            .unwrap_err();
        assert!(err.is_recoverable_tool_error());

        let err = registry
            .invoke(&ToolCall::new("2", "echo", json!("not an object")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));

        let output = registry
            .invoke(&ToolCall::new("3", "echo", json!({"text": "hi"})))
            .await
            .unwrap();
        assert!(matches!(output, ToolOutput::Content(ref s) if s == "hi"));
    }
}
