//! Sequential workflows
//!
//! A workflow is an ordered list of steps, each bound to a registered agent.
//! The content produced by one step is the input of the next. A step may carry
//! a condition on the previous output; when it is false the step is skipped
//! and the previous output is passed along unchanged.

use std::sync::Arc;

use super::run::{RunChunk, RunOutput};

/// Predicate on the previous step's output
pub type StepCondition = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One step of a workflow
#[derive(Clone)]
pub struct WorkflowStep {
    pub name: String,
    /// Name of the registered agent that runs this step
    pub agent: String,
    pub description: String,
    pub condition: Option<StepCondition>,
}

impl WorkflowStep {
    /// Whether the step runs for the given previous output
    pub fn should_run(&self, previous: &str) -> bool {
        self.condition.as_ref().map(|c| c(previous)).unwrap_or(true)
    }
}

impl std::fmt::Debug for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowStep")
            .field("name", &self.name)
            .field("agent", &self.agent)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// An ordered sequence of agent steps
///
/// ```ignore
/// let workflow = Workflow::new("research")
///     .step("draft", "writer")
///     .step_if("polish", "editor", |draft| draft.len() > 200);
/// let result = manager.run_workflow(&workflow, "Write about Rust").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    description: String,
    steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Workflow {}", name),
            name,
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a step that always runs
    pub fn step(mut self, name: impl Into<String>, agent: impl Into<String>) -> Self {
        let agent = agent.into();
        self.steps.push(WorkflowStep {
            name: name.into(),
            description: format!("Step executed by {}", agent),
            agent,
            condition: None,
        });
        self
    }

    /// Append a step that runs only when `condition` accepts the previous output
    pub fn step_if<F>(self, name: impl Into<String>, agent: impl Into<String>, condition: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let mut workflow = self.step(name, agent);
        if let Some(step) = workflow.steps.last_mut() {
            step.condition = Some(Arc::new(condition));
        }
        workflow
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }
}

/// Outcome of one workflow step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub agent: String,
    /// `None` when the step's condition skipped it
    pub output: Option<RunOutput>,
}

impl StepResult {
    pub fn skipped(&self) -> bool {
        self.output.is_none()
    }
}

/// Outcome of a workflow run
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub steps: Vec<StepResult>,
    /// Content of the last executed step, or the input if none ran
    pub content: String,
}

impl WorkflowResult {
    /// Result of a step by name
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Progress of a streamed workflow
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A step is about to run
    StepStarted {
        step: String,
        agent: String,
        description: String,
    },
    /// A step's condition rejected the previous output
    StepSkipped { step: String, agent: String },
    /// Assistant text produced by a step
    Chunk { step: String, chunk: RunChunk },
    /// A step finished; its content is the next step's input
    StepCompleted { step: String, output: RunOutput },
    /// Every step ran or was skipped
    Completed { content: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_in_order() {
        let workflow = Workflow::new("review")
            .step("draft", "writer")
            .step_if("polish", "editor", |prev| prev.contains("TODO"));

        let names: Vec<&str> = workflow.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["draft", "polish"]);
        assert_eq!(workflow.description(), "Workflow review");
        assert!(workflow.steps()[0].should_run("anything"));
        assert!(workflow.steps()[1].should_run("has a TODO"));
        assert!(!workflow.steps()[1].should_run("finished"));
    }
}
