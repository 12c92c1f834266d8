//! Function-backed tools
//!
//! ```ignore
//! let multiply = FunctionTool::builder("multiply", "Multiply two integers")
//!     .param::<i64>("a", "First factor")
//!     .param::<i64>("b", "Second factor")
//!     .sync_handler(|args| Ok(args.get::<i64>("a")? * args.get::<i64>("b")?))?;
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::schema::{ParamType, Parameter, ParameterSchema, ToolParam};
use super::tool::{validate_tool_name, Tool, ToolOutput};
use crate::core::{AgentError, AgentResult};

type HandlerFuture = Pin<Box<dyn Future<Output = AgentResult<ToolOutput>> + Send>>;
type Handler = Arc<dyn Fn(ToolArgs) -> HandlerFuture + Send + Sync>;

/// Validated arguments passed to a tool handler
#[derive(Debug, Clone)]
pub struct ToolArgs {
    tool: String,
    args: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(tool: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }

    /// Typed access to a required argument
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> AgentResult<T> {
        self.get_opt(name)?.ok_or_else(|| {
            AgentError::tool_invocation(&self.tool, format!("missing argument '{}'", name))
        })
    }

    /// Typed access to an optional argument
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> AgentResult<Option<T>> {
        match self.args.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                AgentError::tool_invocation(
                    &self.tool,
                    format!("argument '{}' has the wrong shape: {}", name, e),
                )
            }),
        }
    }

    /// Optional argument with a fallback
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> AgentResult<T> {
        Ok(self.get_opt(name)?.unwrap_or(default))
    }

    /// The raw argument map
    pub fn raw(&self) -> &Map<String, Value> {
        &self.args
    }
}

/// A tool backed by a Rust closure
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: ParameterSchema,
    fatal: bool,
    handler: Handler,
}

impl FunctionTool {
    /// Start declaring a tool
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> FunctionToolBuilder {
        FunctionToolBuilder {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::new(),
            fatal: false,
            error: None,
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("fatal", &self.fatal)
            .finish()
    }
}

/// Builder for `FunctionTool`
///
/// Declaration errors (bad names, duplicate parameters) are collected and
/// reported when the handler is attached.
pub struct FunctionToolBuilder {
    name: String,
    description: String,
    parameters: ParameterSchema,
    fatal: bool,
    error: Option<AgentError>,
}

impl FunctionToolBuilder {
    /// Declare a required parameter whose JSON type follows `T`
    pub fn param<T: ToolParam>(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.declare(Parameter::of::<T>(name, description, true))
    }

    /// Declare an optional parameter whose JSON type follows `T`
    pub fn optional<T: ToolParam>(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.declare(Parameter::of::<T>(name, description, false))
    }

    /// Declare a parameter with an explicit JSON type
    pub fn param_of(
        self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let param = if required {
            Parameter::required(name, kind, description)
        } else {
            Parameter::optional(name, kind, description)
        };
        self.declare(param)
    }

    /// Make invocation errors of this tool end the run
    pub fn fatal_on_error(mut self) -> Self {
        self.fatal = true;
        self
    }

    fn declare(mut self, param: Parameter) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.parameters.push(param) {
                self.error = Some(AgentError::configuration(format!(
                    "tool '{}': {}",
                    self.name, e
                )));
            }
        }
        self
    }

    /// Attach an async handler and finish the tool
    pub fn handler<F, Fut, O>(self, handler: F) -> AgentResult<FunctionTool>
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<O>> + Send + 'static,
        O: Into<ToolOutput>,
    {
        let handler: Handler = Arc::new(move |args: ToolArgs| -> HandlerFuture {
            let fut = handler(args);
            Box::pin(async move {
                let output: AgentResult<ToolOutput> = fut.await.map(Into::into);
                output
            })
        });
        self.build(handler)
    }

    /// Attach a synchronous handler and finish the tool
    pub fn sync_handler<F, O>(self, handler: F) -> AgentResult<FunctionTool>
    where
        F: Fn(ToolArgs) -> AgentResult<O> + Send + Sync + 'static,
        O: Into<ToolOutput>,
    {
        let handler: Handler = Arc::new(move |args: ToolArgs| -> HandlerFuture {
            let result: AgentResult<ToolOutput> = handler(args).map(Into::into);
            Box::pin(async move { result })
        });
        self.build(handler)
    }

    fn build(self, handler: Handler) -> AgentResult<FunctionTool> {
        if let Some(err) = self.error {
            return Err(err);
        }
        validate_tool_name(&self.name)?;
        Ok(FunctionTool {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            fatal: self.fatal,
            handler,
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> AgentResult<ToolOutput> {
        self.parameters.validate(&self.name, arguments)?;
        (self.handler)(ToolArgs::new(&self.name, arguments.clone())).await
    }

    fn fatal_on_error(&self) -> bool {
        self.fatal
    }
}
