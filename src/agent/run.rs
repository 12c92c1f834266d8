//! Execution state machine shared by blocking and streaming runs
//!
//! A run alternates between awaiting the model and dispatching the tool calls
//! it requested until the model answers without tool calls. Handoffs switch
//! the active agent; the switch takes effect on the next round.

use std::borrow::Cow;
use std::collections::HashMap;

use super::agent::{Agent, AgentRef};
use super::config::{RunConfig, ToolErrorPolicy};
use super::history::trim_history;
use super::input::RunInput;
use crate::core::{AgentError, AgentResult};
use crate::llm::{collect_stream, Message, ModelResponse, ToolCall};
use crate::tools::{HandoffTarget, ToolOutput};

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Content of the final assistant message
    pub content: String,
    /// Full conversation, including tool calls and results
    pub messages: Vec<Message>,
    /// Name of the agent that produced the final answer
    pub agent: String,
    /// Number of model calls made
    pub rounds: usize,
}

/// A piece of streamed assistant text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunChunk {
    /// Agent that produced the text
    pub agent: String,
    pub content: String,
}

pub(crate) struct RunState {
    active: AgentRef,
    messages: Vec<Message>,
    rounds: usize,
    config: RunConfig,
    /// Registered agents, for resolving named handoff targets
    agents: HashMap<String, AgentRef>,
}

impl RunState {
    pub(crate) fn new(
        active: AgentRef,
        input: RunInput,
        config: RunConfig,
        agents: HashMap<String, AgentRef>,
    ) -> AgentResult<Self> {
        config.validate()?;
        Ok(Self {
            active,
            messages: input.into_messages(),
            rounds: 0,
            config,
            agents,
        })
    }

    pub(crate) fn active(&self) -> &AgentRef {
        &self.active
    }

    /// History to send with the next model call, trimmed to the configured
    /// token budget. The full history is kept for the run output.
    pub(crate) fn request_messages(&self) -> Cow<'_, [Message]> {
        match self.config.max_history_tokens {
            Some(limit) => trim_history(&self.messages, limit),
            None => Cow::Borrowed(&self.messages),
        }
    }

    /// Count a model round, failing once the budget is spent
    pub(crate) fn begin_round(&mut self) -> AgentResult<()> {
        if self.rounds >= self.config.max_rounds {
            tracing::warn!(
                "[AgentManager] Reached max rounds ({}), stopping",
                self.config.max_rounds
            );
            return Err(AgentError::BudgetExceeded {
                max_rounds: self.config.max_rounds,
            });
        }
        self.rounds += 1;
        tracing::debug!(
            "[AgentManager] Round {} with agent {}",
            self.rounds,
            self.active.name()
        );
        Ok(())
    }

    /// Record a model response. Returns the final content once the model
    /// answers without tool calls; otherwise dispatches the calls.
    pub(crate) async fn complete_round(
        &mut self,
        response: ModelResponse,
    ) -> AgentResult<Option<String>> {
        if let Some(usage) = response.usage {
            tracing::debug!(
                "[AgentManager] Usage: {} in, {} out",
                usage.input_tokens,
                usage.output_tokens
            );
        }

        if !response.has_tool_calls() {
            self.messages.push(Message::assistant(response.content.clone()));
            return Ok(Some(response.content));
        }

        tracing::info!(
            "[AgentManager] {} requested {} tool call(s)",
            self.active.name(),
            response.tool_calls.len()
        );
        self.messages.push(Message::assistant_with_tool_calls(
            response.content,
            response.tool_calls.clone(),
        ));
        self.dispatch(&response.tool_calls).await?;
        Ok(None)
    }

    /// Run a batch of tool calls against the tools of the agent that
    /// produced it
    async fn dispatch(&mut self, calls: &[ToolCall]) -> AgentResult<()> {
        let owner = self.active.clone();

        for call in calls {
            match owner.tools().invoke(call).await {
                Ok(ToolOutput::Content(content)) => {
                    tracing::debug!("[AgentManager] {} -> {} chars", call.name, content.len());
                    self.messages.push(Message::tool_result(call, content, false));
                }
                Ok(ToolOutput::Handoff(handoff)) => {
                    let target = match handoff.target {
                        HandoffTarget::Agent(agent) => agent,
                        HandoffTarget::Named(name) => self.resolve(&name)?,
                    };
                    if let Some(instruction) = handoff.instruction {
                        target.set_instruction(instruction);
                    }
                    tracing::info!(
                        "[AgentManager] Handoff from {} to {} via {}",
                        self.active.name(),
                        target.name(),
                        call.name
                    );
                    self.messages.push(Message::tool_result(
                        call,
                        format!("Transferred to agent {}", target.name()),
                        false,
                    ));
                    self.active = target;
                }
                Err(err) if err.is_recoverable_tool_error() && !self.is_fatal(&owner, call) => {
                    tracing::warn!("[AgentManager] Tool error reported to model: {}", err);
                    self.messages
                        .push(Message::tool_result(call, format!("Error: {}", err), true));
                }
                Err(err) => {
                    tracing::error!("[AgentManager] Tool {} failed: {}", call.name, err);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn is_fatal(&self, owner: &Agent, call: &ToolCall) -> bool {
        self.config.tool_error_policy == ToolErrorPolicy::Fatal
            || owner.tools().is_fatal_on_error(&call.name)
    }

    fn resolve(&self, name: &str) -> AgentResult<AgentRef> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::Handoff(format!("no agent named '{}' is registered", name)))
    }

    pub(crate) fn finish(self, content: String) -> RunOutput {
        tracing::info!(
            "[AgentManager] Run finished with {} after {} round(s)",
            self.active.name(),
            self.rounds
        );
        RunOutput {
            content,
            messages: self.messages,
            agent: self.active.name().to_string(),
            rounds: self.rounds,
        }
    }
}

/// Query the agent's model once, collecting a stream if the adapter prefers it
pub(crate) async fn call_model(agent: &Agent, messages: &[Message]) -> AgentResult<ModelResponse> {
    let instruction = agent.instruction();
    let tools = agent.definitions();
    let model = agent.model();

    if model.prefers_streaming() {
        let stream = model.generate_stream(&instruction, messages, &tools).await?;
        collect_stream(model.provider_name(), stream).await
    } else {
        model.generate(&instruction, messages, &tools).await
    }
}
