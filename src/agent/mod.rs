//! Agents and their execution
//!
//! - `agent`: the `Agent` definition and its builder
//! - `config`: run options (`RunConfig`)
//! - `history`: token estimates and history trimming
//! - `manager`: `AgentManager`, the blocking and streaming entry points
//! - `workflow`: sequential multi-agent workflows

pub mod agent;
pub mod config;
pub mod history;
pub mod input;
pub mod manager;
mod run;
pub mod workflow;

pub use agent::{Agent, AgentBuilder, AgentRef};
pub use config::{RunConfig, ToolErrorPolicy, DEFAULT_MAX_ROUNDS};
pub use input::RunInput;
pub use history::{estimate_tokens, trim_history, truncate_to_token_limit};
pub use manager::{AgentManager, RunStream, WorkflowStream};
pub use run::{RunChunk, RunOutput};
pub use workflow::{
    StepCondition, StepResult, Workflow, WorkflowEvent, WorkflowResult, WorkflowStep,
};
