//! Multi-agent orchestration over LLM providers
//!
//! Agents pair an instruction with a model adapter (OpenAI and compatible
//! endpoints, Anthropic, Gemini) and a set of tools. The `AgentManager` runs
//! the model/tool loop, follows handoffs between agents and can stream text
//! as it arrives.

pub mod core;
pub mod llm;
pub mod tools;

// Tools that run jobs in containers
pub mod container;

pub mod agent;
pub mod logging;

pub use agent::{
    Agent, AgentManager, AgentRef, RunChunk, RunConfig, RunOutput, Workflow, WorkflowEvent,
};
pub use core::{AgentError, AgentResult};
