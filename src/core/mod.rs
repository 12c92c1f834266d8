//! Core types shared across the crate
//!
//! - `AgentError` / `AgentResult` - Error taxonomy for configuration, providers and tools

pub mod error;

pub use error::{AgentError, AgentResult, RequestErrorKind};
