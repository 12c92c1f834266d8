//! Tool system
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolOutput` / `Handoff` - Text results or a switch of the active agent
//! - `FunctionTool` - Tools backed by Rust closures with a typed parameter builder
//! - `ParameterSchema` - Ordered parameter declarations and argument validation
//! - `ToolRegistry` - Ordered, name-unique tool set of an agent

mod function;
mod registry;
mod schema;
mod tool;

pub use function::{FunctionTool, FunctionToolBuilder, ToolArgs};
pub use registry::ToolRegistry;
pub use schema::{argument_object, ParamType, Parameter, ParameterSchema, ToolParam};
pub use tool::{validate_tool_name, Handoff, HandoffTarget, Tool, ToolOutput};
