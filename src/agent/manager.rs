//! Agent manager
//!
//! Registry of agents by name and entry point for runs. `run` blocks until the
//! final answer; `run_stream` forwards assistant text as it arrives and
//! dispatches tool calls once each streamed turn is complete. Workflows chain
//! runs of several agents, blocking or streamed.

use futures::{future, Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;

use super::agent::AgentRef;
use super::config::RunConfig;
use super::input::RunInput;
use super::run::{call_model, RunChunk, RunOutput, RunState};
use super::workflow::{StepResult, Workflow, WorkflowEvent, WorkflowResult};
use crate::core::{AgentError, AgentResult};
use crate::llm::{StreamAccumulator, StreamEvent};

/// Stream of assistant text; a failure is the last item
pub type RunStream = Pin<Box<dyn Stream<Item = AgentResult<RunChunk>> + Send>>;

/// Stream of workflow progress; a failure is the last item
pub type WorkflowStream = Pin<Box<dyn Stream<Item = AgentResult<WorkflowEvent>> + Send>>;

/// Owns the registered agents and runs them
///
/// # Example
///
/// ```ignore
/// let mut manager = AgentManager::new();
/// manager.add_agent(calculator)?;
///
/// let output = manager.run("calculator", "What is 2 * 3?").await?;
/// println!("{}", output.content);
/// ```
#[derive(Default)]
pub struct AgentManager {
    agents: HashMap<String, AgentRef>,
    config: RunConfig,
}

impl AgentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with custom run options
    pub fn with_config(config: RunConfig) -> Self {
        Self {
            agents: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Register an agent under its name. A duplicate name is an error.
    pub fn add_agent(&mut self, agent: impl Into<AgentRef>) -> AgentResult<()> {
        let agent = agent.into();
        if self.agents.contains_key(agent.name()) {
            return Err(AgentError::configuration(format!(
                "an agent named '{}' is already registered",
                agent.name()
            )));
        }
        tracing::debug!("[AgentManager] Added agent {}", agent.describe());
        self.agents.insert(agent.name().to_string(), agent);
        Ok(())
    }

    pub fn get_agent(&self, name: &str) -> Option<AgentRef> {
        self.agents.get(name).cloned()
    }

    /// Registered agent names, sorted
    pub fn agent_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn remove_agent(&mut self, name: &str) -> Option<AgentRef> {
        self.agents.remove(name)
    }

    fn require(&self, name: &str) -> AgentResult<AgentRef> {
        self.get_agent(name)
            .ok_or_else(|| AgentError::configuration(format!("no agent named '{}'", name)))
    }

    /// Run an agent until it answers without tool calls
    pub async fn run(&self, agent_name: &str, input: impl Into<RunInput>) -> AgentResult<RunOutput> {
        let start = self.require(agent_name)?;
        tracing::info!("[AgentManager] Starting run with {}", agent_name);

        let mut state = RunState::new(start, input.into(), self.config.clone(), self.agents.clone())?;
        loop {
            state.begin_round()?;
            let agent = state.active().clone();
            let response = call_model(&agent, &state.request_messages()).await?;
            if let Some(content) = state.complete_round(response).await? {
                return Ok(state.finish(content));
            }
        }
    }

    /// Run an agent, streaming assistant text as it arrives
    ///
    /// Tool-call fragments are buffered until the provider ends the turn, then
    /// dispatched exactly as in `run`. Text is forwarded as soon as it
    /// arrives, including any text a provider sends ahead of tool calls in
    /// the same turn. Errors are yielded as the final item.
    pub fn run_stream(&self, agent_name: &str, input: impl Into<RunInput>) -> RunStream {
        tracing::info!("[AgentManager] Starting streaming run with {}", agent_name);
        let events = stream_run(
            self.require(agent_name),
            input.into(),
            self.config.clone(),
            self.agents.clone(),
        );

        Box::pin(events.filter_map(|event| {
            future::ready(match event {
                Ok(RunEvent::Chunk(chunk)) => Some(Ok(chunk)),
                Ok(RunEvent::Finished(_)) => None,
                Err(err) => Some(Err(err)),
            })
        }))
    }

    /// Check that a workflow can run: it has steps and every agent exists
    fn check_workflow(&self, workflow: &Workflow) -> AgentResult<()> {
        if workflow.steps().is_empty() {
            return Err(AgentError::configuration(format!(
                "workflow '{}' has no steps",
                workflow.name()
            )));
        }
        for step in workflow.steps() {
            self.require(&step.agent)?;
        }
        self.config.validate()
    }

    /// Run the steps of a workflow in order, feeding each step's content to
    /// the next
    pub async fn run_workflow(
        &self,
        workflow: &Workflow,
        input: impl Into<String>,
    ) -> AgentResult<WorkflowResult> {
        self.check_workflow(workflow)?;

        tracing::info!(
            "[AgentManager] Running workflow {} ({} steps)",
            workflow.name(),
            workflow.steps().len()
        );

        let mut current = input.into();
        let mut steps = Vec::with_capacity(workflow.steps().len());

        for step in workflow.steps() {
            if !step.should_run(&current) {
                tracing::info!("[AgentManager] Skipping step {}", step.name);
                steps.push(StepResult {
                    name: step.name.clone(),
                    agent: step.agent.clone(),
                    output: None,
                });
                continue;
            }

            tracing::info!("[AgentManager] Executing step {} with {}", step.name, step.agent);
            let output = self.run(&step.agent, current.as_str()).await?;
            current = output.content.clone();
            steps.push(StepResult {
                name: step.name.clone(),
                agent: step.agent.clone(),
                output: Some(output),
            });
        }

        Ok(WorkflowResult {
            steps,
            content: current,
        })
    }

    /// Run a workflow, streaming step progress and each step's text
    ///
    /// The next step's input is the final content of the step before it, as
    /// in `run_workflow`. Errors are yielded as the final item.
    pub fn run_workflow_stream(&self, workflow: &Workflow, input: impl Into<String>) -> WorkflowStream {
        let checked = self.check_workflow(workflow);
        let name = workflow.name().to_string();
        let steps = workflow.steps().to_vec();
        let config = self.config.clone();
        let agents = self.agents.clone();
        let mut current = input.into();

        let stream = async_stream::try_stream! {
            checked?;
            tracing::info!(
                "[AgentManager] Streaming workflow {} ({} steps)",
                name,
                steps.len()
            );

            for step in steps {
                if !step.should_run(&current) {
                    tracing::info!("[AgentManager] Skipping step {}", step.name);
                    yield WorkflowEvent::StepSkipped {
                        step: step.name.clone(),
                        agent: step.agent.clone(),
                    };
                    continue;
                }

                yield WorkflowEvent::StepStarted {
                    step: step.name.clone(),
                    agent: step.agent.clone(),
                    description: step.description.clone(),
                };

                let start = agents
                    .get(&step.agent)
                    .cloned()
                    .ok_or_else(|| AgentError::configuration(format!("no agent named '{}'", step.agent)));
                let mut events = stream_run(
                    start,
                    RunInput::from(current.as_str()),
                    config.clone(),
                    agents.clone(),
                );

                while let Some(event) = events.next().await {
                    match event? {
                        RunEvent::Chunk(chunk) => {
                            yield WorkflowEvent::Chunk {
                                step: step.name.clone(),
                                chunk,
                            };
                        }
                        RunEvent::Finished(output) => {
                            current = output.content.clone();
                            yield WorkflowEvent::StepCompleted {
                                step: step.name.clone(),
                                output,
                            };
                        }
                    }
                }
            }

            yield WorkflowEvent::Completed { content: current };
        };

        Box::pin(stream)
    }
}

/// Item of the streaming loop: text as it arrives, then the run's output
enum RunEvent {
    Chunk(RunChunk),
    Finished(RunOutput),
}

type RunEventStream = Pin<Box<dyn Stream<Item = AgentResult<RunEvent>> + Send>>;

/// Streaming execution loop shared by `run_stream` and `run_workflow_stream`
fn stream_run(
    start: AgentResult<AgentRef>,
    input: RunInput,
    config: RunConfig,
    agents: HashMap<String, AgentRef>,
) -> RunEventStream {
    let stream = async_stream::try_stream! {
        let mut state = RunState::new(start?, input, config, agents)?;

        loop {
            state.begin_round()?;
            let agent = state.active().clone();
            let instruction = agent.instruction();
            let tools = agent.definitions();
            let model = agent.model().clone();

            let mut events = model
                .generate_stream(&instruction, &state.request_messages(), &tools)
                .await?;
            let mut acc = StreamAccumulator::new();

            while let Some(event) = events.next().await {
                let event = event?;
                if let StreamEvent::TextDelta(text) = &event {
                    if !text.is_empty() {
                        yield RunEvent::Chunk(RunChunk {
                            agent: agent.name().to_string(),
                            content: text.clone(),
                        });
                    }
                }
                acc.push(&event);
            }

            if !acc.is_done() {
                Err::<(), _>(AgentError::transport(
                    model.provider_name(),
                    "stream ended before the turn completed",
                ))?;
            }

            if let Some(content) = state.complete_round(acc.finish()).await? {
                yield RunEvent::Finished(state.finish(content));
                break;
            }
        }
    };

    Box::pin(stream)
}

impl std::fmt::Debug for AgentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentManager")
            .field("agents", &self.agent_names())
            .field("config", &self.config)
            .finish()
    }
}
