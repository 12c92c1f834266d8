//! Run configuration
//!
//! Options that apply to every run of an `AgentManager`.

use crate::core::{AgentError, AgentResult};

/// Default maximum number of model rounds per run
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// What the loop does when a tool invocation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolErrorPolicy {
    /// Report the error to the model as an error-bearing tool result
    #[default]
    Report,
    /// End the run with the error
    Fatal,
}

/// Configuration for agent runs
///
/// ```ignore
/// let config = RunConfig::new()
///     .with_max_rounds(10)
///     .with_max_history_tokens(8_000)
///     .with_tool_error_policy(ToolErrorPolicy::Fatal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum number of model calls per run (prevents infinite tool loops)
    pub max_rounds: usize,

    /// Handling of recoverable tool errors
    pub tool_error_policy: ToolErrorPolicy,

    /// Estimated token budget for the history sent with each model call.
    /// Unlimited when unset.
    pub max_history_tokens: Option<usize>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_error_policy: ToolErrorPolicy::Report,
            max_history_tokens: None,
        }
    }

    /// Set the maximum number of model rounds per run
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_tool_error_policy(mut self, policy: ToolErrorPolicy) -> Self {
        self.tool_error_policy = policy;
        self
    }

    /// Trim the history sent to the model to about `tokens` tokens
    pub fn with_max_history_tokens(mut self, tokens: usize) -> Self {
        self.max_history_tokens = Some(tokens);
        self
    }

    /// Reject settings under which no run can complete
    pub fn validate(&self) -> AgentResult<()> {
        if self.max_rounds == 0 {
            return Err(AgentError::configuration("max_rounds must be at least 1"));
        }
        if self.max_history_tokens == Some(0) {
            return Err(AgentError::configuration(
                "max_history_tokens must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new()
    }
}
