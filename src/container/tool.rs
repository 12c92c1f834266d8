//! Container-backed tool
//!
//! Each declared environment input becomes a tool parameter. On invocation the
//! arguments are validated, turned into environment variables and handed to
//! the container runtime. A `return_to` target turns the output into a handoff.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::runtime::{ContainerJob, ContainerRuntime, RegistryCredentials};
use crate::agent::AgentRef;
use crate::core::{AgentError, AgentResult};
use crate::tools::{validate_tool_name, Handoff, ParamType, Parameter, ParameterSchema, Tool, ToolOutput};

/// Placeholder replaced with the container output in a `return_to` instruction
pub const RESULT_PLACEHOLDER: &str = "{result}";

fn default_kind() -> ParamType {
    ParamType::String
}

fn default_required() -> bool {
    true
}

/// An environment input of a container tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

/// Agent that receives the container output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReturnTo {
    /// Name of a registered agent
    pub agent: String,
    /// New instruction for that agent; `{result}` is replaced with the output
    pub instruction: String,
}

/// Declarative description of a container tool
///
/// ```ignore
/// let spec: ContainerSpec = serde_json::from_value(json!({
///     "name": "run_python",
///     "description": "Run a Python snippet",
///     "image": "python:3.12-slim",
///     "environment": [{"name": "CODE", "type": "string"}],
///     "command": "python -c \"$CODE\"",
///     "return_to": {"agent": "reviewer", "instruction": "The result is: {result}"}
/// }))?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerSpec {
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub environment: Vec<EnvVarSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticate: Option<RegistryCredentials>,
    /// Shell command run inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<ReturnTo>,
}

impl ContainerSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            image: image.into(),
            environment: Vec::new(),
            authenticate: None,
            command: None,
            volumes: Vec::new(),
            network: None,
            return_to: None,
        }
    }

    /// Declare a required environment input
    pub fn env(mut self, name: impl Into<String>, kind: ParamType) -> Self {
        self.environment.push(EnvVarSpec {
            name: name.into(),
            kind,
            description: String::new(),
            required: true,
        });
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn authenticate(mut self, credentials: RegistryCredentials) -> Self {
        self.authenticate = Some(credentials);
        self
    }

    /// Hand the output to a registered agent by name
    pub fn return_to(mut self, agent: impl Into<String>, instruction: impl Into<String>) -> Self {
        self.return_to = Some(ReturnTo {
            agent: agent.into(),
            instruction: instruction.into(),
        });
        self
    }
}

enum ReturnTarget {
    Named(String),
    Agent(AgentRef),
}

/// Tool that runs a container job
pub struct ContainerTool {
    spec: ContainerSpec,
    parameters: ParameterSchema,
    runtime: Arc<dyn ContainerRuntime>,
    return_target: Option<(ReturnTarget, String)>,
}

impl ContainerTool {
    /// Validate a spec and bind it to a runtime
    pub fn new(spec: ContainerSpec, runtime: Arc<dyn ContainerRuntime>) -> AgentResult<Self> {
        validate_tool_name(&spec.name)?;
        if spec.description.trim().is_empty() {
            return Err(AgentError::configuration(format!(
                "container tool '{}' needs a description",
                spec.name
            )));
        }
        if spec.image.trim().is_empty() {
            return Err(AgentError::configuration(format!(
                "container tool '{}' needs an image",
                spec.name
            )));
        }

        let mut parameters = ParameterSchema::new();
        for env in &spec.environment {
            let param = Parameter {
                name: env.name.clone(),
                kind: env.kind,
                description: env.description.clone(),
                required: env.required,
                items: None,
            };
            parameters.push(param).map_err(|e| {
                AgentError::configuration(format!("container tool '{}': {}", spec.name, e))
            })?;
        }

        let return_target = spec
            .return_to
            .as_ref()
            .map(|r| (ReturnTarget::Named(r.agent.clone()), r.instruction.clone()));

        Ok(Self {
            spec,
            parameters,
            runtime,
            return_target,
        })
    }

    /// Hand the output to a concrete agent instead of a registered name
    pub fn return_to_agent(mut self, agent: AgentRef, instruction: impl Into<String>) -> Self {
        self.return_target = Some((ReturnTarget::Agent(agent), instruction.into()));
        self
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    fn job(&self, arguments: &Map<String, Value>) -> ContainerJob {
        let env = self
            .spec
            .environment
            .iter()
            .filter_map(|var| {
                let value = match arguments.get(&var.name)? {
                    Value::String(s) => s.clone(),
                    Value::Null => return None,
                    other => other.to_string(),
                };
                Some((var.name.clone(), value))
            })
            .collect();

        ContainerJob {
            image: self.spec.image.clone(),
            env,
            command: self.spec.command.clone(),
            volumes: self.spec.volumes.clone(),
            network: self.spec.network.clone(),
        }
    }

    /// Errors raised by the runtime are reported under this tool's name
    fn own_error(&self, err: AgentError) -> AgentError {
        match err {
            AgentError::ToolInvocation { message, .. } => {
                AgentError::tool_invocation(&self.spec.name, message)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for ContainerTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerTool")
            .field("name", &self.spec.name)
            .field("image", &self.spec.image)
            .finish()
    }
}

#[async_trait]
impl Tool for ContainerTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> AgentResult<ToolOutput> {
        self.parameters.validate(&self.spec.name, arguments)?;

        if let Some(credentials) = &self.spec.authenticate {
            self.runtime
                .login(credentials)
                .await
                .map_err(|e| self.own_error(e))?;
            self.runtime
                .pull(&self.spec.image)
                .await
                .map_err(|e| self.own_error(e))?;
        }

        let output = self
            .runtime
            .run(&self.job(arguments))
            .await
            .map_err(|e| self.own_error(e))?;

        if !output.success() {
            tracing::warn!(
                "[Container] {} exited with code {}",
                self.spec.name,
                output.exit_code
            );
            return Err(AgentError::tool_invocation(
                &self.spec.name,
                format!(
                    "container exited with code {}: {}",
                    output.exit_code,
                    output.output.trim_end()
                ),
            ));
        }

        let result = output.output.trim_end().to_string();

        match &self.return_target {
            None => Ok(ToolOutput::Content(result)),
            Some((target, template)) => {
                let instruction = template.replace(RESULT_PLACEHOLDER, &result);
                let handoff = match target {
                    ReturnTarget::Agent(agent) => Handoff::to(agent.clone()),
                    ReturnTarget::Named(name) => Handoff::to_named(name.clone()),
                };
                tracing::info!("[Container] {} returns to {}", self.spec.name, handoff.target.name());
                Ok(ToolOutput::Handoff(handoff.with_instruction(instruction)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::runtime::ContainerOutput;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        jobs: Mutex<Vec<ContainerJob>>,
        exit_code: i32,
        output: String,
    }

    #[async_trait]
    impl ContainerRuntime for Recorder {
        async fn login(&self, credentials: &RegistryCredentials) -> AgentResult<()> {
            self.calls.lock().unwrap().push(format!("login {}", credentials.username));
            Ok(())
        }

        async fn pull(&self, image: &str) -> AgentResult<()> {
            self.calls.lock().unwrap().push(format!("pull {}", image));
            Ok(())
        }

        async fn run(&self, job: &ContainerJob) -> AgentResult<ContainerOutput> {
            self.calls.lock().unwrap().push(format!("run {}", job.image));
            self.jobs.lock().unwrap().push(job.clone());
            Ok(ContainerOutput {
                exit_code: self.exit_code,
                output: self.output.clone(),
            })
        }
    }

    fn recorder(exit_code: i32, output: &str) -> Arc<Recorder> {
        Arc::new(Recorder {
            exit_code,
            output: output.to_string(),
            ..Default::default()
        })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_spec_from_json_with_defaults() {
        let spec: ContainerSpec = serde_json::from_value(json!({
            "name": "run_python",
            "description": "Run code",
            "image": "python:3.12-slim",
            "environment": [{"name": "CODE"}, {"name": "COUNT", "type": "integer"}],
            "return_to": {"agent": "reviewer", "instruction": "Got {result}"}
        }))
        .unwrap();
        assert_eq!(spec.environment[0].kind, ParamType::String);
        assert!(spec.environment[0].required);
        assert_eq!(spec.environment[1].kind, ParamType::Integer);
        assert_eq!(spec.return_to.unwrap().agent, "reviewer");

        let err = serde_json::from_value::<ContainerSpec>(json!({
            "name": "x", "description": "y", "image": "z", "ports": [80]
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_new_rejects_incomplete_spec() {
        let runtime = recorder(0, "");
        let err = ContainerTool::new(ContainerSpec::new("job", "Run", ""), runtime.clone()).unwrap_err();
        assert!(err.is_configuration());
        let err = ContainerTool::new(ContainerSpec::new("job", " ", "alpine"), runtime).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_invoke_maps_env_and_trims_output() {
        let runtime = recorder(0, "42\n");
        let spec = ContainerSpec::new("compute", "Compute", "python:3.12-slim")
            .env("CODE", ParamType::String)
            .env("COUNT", ParamType::Integer)
            .command("python -c \"$CODE\"");
        let tool = ContainerTool::new(spec, runtime.clone()).unwrap();

        let output = tool
            .invoke(&args(json!({"CODE": "print(6*7)", "COUNT": 3})))
            .await
            .unwrap();
        assert!(matches!(output, ToolOutput::Content(ref s) if s == "42"));

        let jobs = runtime.jobs.lock().unwrap();
        assert_eq!(
            jobs[0].env,
            vec![
                ("CODE".to_string(), "print(6*7)".to_string()),
                ("COUNT".to_string(), "3".to_string()),
            ]
        );
        assert_eq!(runtime.calls.lock().unwrap().as_slice(), ["run python:3.12-slim"]);
    }

    #[tokio::test]
    async fn test_login_and_pull_before_run() {
        let runtime = recorder(0, "ok");
        let spec = ContainerSpec::new("private", "Private image", "registry.local/app:1").authenticate(
            RegistryCredentials {
                username: "bot".to_string(),
                password: "secret".to_string(),
                registry: Some("registry.local".to_string()),
            },
        );
        let tool = ContainerTool::new(spec, runtime.clone()).unwrap();
        tool.invoke(&Map::new()).await.unwrap();

        assert_eq!(
            runtime.calls.lock().unwrap().as_slice(),
            ["login bot", "pull registry.local/app:1", "run registry.local/app:1"]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_output() {
        let tool = ContainerTool::new(
            ContainerSpec::new("fails", "Always fails", "alpine"),
            recorder(2, "boom\n"),
        )
        .unwrap();
        let err = tool.invoke(&Map::new()).await.unwrap_err();
        assert!(err.is_recoverable_tool_error());
        assert!(err.to_string().contains("code 2"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_named_return_to_builds_handoff() {
        let spec = ContainerSpec::new("answer", "Answer", "alpine")
            .return_to("reviewer", "The result is: {result}");
        let tool = ContainerTool::new(spec, recorder(0, "42")).unwrap();

        match tool.invoke(&Map::new()).await.unwrap() {
            ToolOutput::Handoff(handoff) => {
                assert_eq!(handoff.target.name(), "reviewer");
                assert_eq!(handoff.instruction.as_deref(), Some("The result is: 42"));
            }
            other => panic!("expected handoff, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runtime_unavailable_is_not_a_tool_error() {
        struct Down;

        #[async_trait]
        impl ContainerRuntime for Down {
            async fn login(&self, _: &RegistryCredentials) -> AgentResult<()> {
                Ok(())
            }
            async fn pull(&self, _: &str) -> AgentResult<()> {
                Ok(())
            }
            async fn run(&self, _: &ContainerJob) -> AgentResult<ContainerOutput> {
                Err(AgentError::ContainerRuntimeUnavailable("daemon down".to_string()))
            }
        }

        let tool = ContainerTool::new(ContainerSpec::new("job", "Job", "alpine"), Arc::new(Down)).unwrap();
        let err = tool.invoke(&Map::new()).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(!err.is_recoverable_tool_error());
    }
}
