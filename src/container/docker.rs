//! Docker CLI runtime
//!
//! Drives the `docker` binary through `tokio::process`. A missing binary or an
//! unreachable daemon is reported as `ContainerRuntimeUnavailable`.
//!
//! Every container gets a generated name. Killing the CLI on timeout does not
//! stop the container itself, so a timed-out run is followed by `rm -f`.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::runtime::{ContainerJob, ContainerOutput, ContainerRuntime, RegistryCredentials};
use crate::core::{AgentError, AgentResult};

/// Maximum output length in characters
const MAX_OUTPUT_LENGTH: usize = 100_000;

/// Upper bound for removing a timed-out container
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Messages the CLI prints when it cannot reach the daemon
const DAEMON_UNREACHABLE: &[&str] = &[
    "Cannot connect to the Docker daemon",
    "error during connect",
    "Is the docker daemon running",
];

fn daemon_unreachable(stderr: &str) -> bool {
    DAEMON_UNREACHABLE.iter().any(|marker| stderr.contains(marker))
}

fn container_name() -> String {
    format!("agent-{}", uuid::Uuid::new_v4().simple())
}

/// Build the argument list for `docker run`
pub(crate) fn run_args(job: &ContainerJob, name: &str) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        name.to_string(),
    ];
    for (name, value) in &job.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", name, value));
    }
    for volume in &job.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }
    if let Some(network) = &job.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }
    args.push(job.image.clone());
    if let Some(command) = &job.command {
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(command.clone());
    }
    args
}

/// Build the argument list that force-removes a container
pub(crate) fn cleanup_args(name: &str) -> Vec<String> {
    vec!["rm".to_string(), "-f".to_string(), name.to_string()]
}

/// Container runtime backed by the Docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Option<Duration>,
}

impl DockerCli {
    /// Use `docker` from `PATH`
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
            timeout: None,
        }
    }

    /// Use a specific CLI binary (e.g. `podman`)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Abort container runs that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the CLI. `container` names the container a timed-out call leaves
    /// behind, which is then force-removed.
    async fn exec(
        &self,
        args: &[String],
        stdin: Option<&str>,
        container: Option<&str>,
    ) -> AgentResult<Output> {
        tracing::debug!("[Container] {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AgentError::ContainerRuntimeUnavailable(format!(
                        "'{}' not found. Install it on the host.",
                        self.binary
                    ))
                } else {
                    AgentError::ContainerRuntimeUnavailable(e.to_string())
                }
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await.map_err(|e| {
                AgentError::ContainerRuntimeUnavailable(format!("failed to write stdin: {}", e))
            })?;
        }

        let output_future = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => match timeout(limit, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        "[Container] {} timed out after {}s",
                        self.binary,
                        limit.as_secs()
                    );
                    if let Some(name) = container {
                        self.remove(name).await;
                    }
                    return Err(AgentError::tool_invocation(
                        &self.binary,
                        format!("timed out after {}s", limit.as_secs()),
                    ))
                }
            },
            None => output_future.await,
        }
        .map_err(|e| AgentError::ContainerRuntimeUnavailable(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && daemon_unreachable(&stderr) {
            return Err(AgentError::ContainerRuntimeUnavailable(
                stderr.trim().to_string(),
            ));
        }

        Ok(output)
    }

    /// Force-remove a container, logging instead of failing
    async fn remove(&self, name: &str) {
        tracing::info!("[Container] Removing container {}", name);

        let removal = Command::new(&self.binary)
            .args(cleanup_args(name))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        match timeout(CLEANUP_TIMEOUT, removal).await {
            Ok(Ok(output)) if output.status.success() => {}
            Ok(Ok(output)) => tracing::warn!(
                "[Container] Failed to remove {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Ok(Err(e)) => tracing::warn!("[Container] Failed to remove {}: {}", name, e),
            Err(_) => tracing::warn!("[Container] Removing {} timed out", name),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn login(&self, credentials: &RegistryCredentials) -> AgentResult<()> {
        tracing::info!(
            "[Container] Logging in to {} as {}",
            credentials.registry.as_deref().unwrap_or("default registry"),
            credentials.username
        );

        let mut args = vec![
            "login".to_string(),
            "--username".to_string(),
            credentials.username.clone(),
            "--password-stdin".to_string(),
        ];
        if let Some(registry) = &credentials.registry {
            args.push(registry.clone());
        }

        let output = self.exec(&args, Some(&credentials.password), None).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::tool_invocation(
                &self.binary,
                format!("registry authentication failed: {}", stderr.trim()),
            ));
        }
        Ok(())
    }

    async fn pull(&self, image: &str) -> AgentResult<()> {
        tracing::info!("[Container] Pulling image {}", image);

        let output = self
            .exec(&["pull".to_string(), image.to_string()], None, None)
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::tool_invocation(
                &self.binary,
                format!("error pulling image {}: {}", image, stderr.trim()),
            ));
        }
        Ok(())
    }

    async fn run(&self, job: &ContainerJob) -> AgentResult<ContainerOutput> {
        let name = container_name();
        tracing::info!("[Container] Running image {} as {}", job.image, name);

        let output = self.exec(&run_args(job, &name), None, Some(name.as_str())).await?;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Combine stdout and stderr
        let mut combined = String::new();
        combined.push_str(&stdout);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if combined.len() > MAX_OUTPUT_LENGTH {
            let mut cut = MAX_OUTPUT_LENGTH;
            while !combined.is_char_boundary(cut) {
                cut -= 1;
            }
            combined.truncate(cut);
            combined.push_str("\n... (output truncated)");
        }

        tracing::debug!("[Container] Exit code: {}", exit_code);
        tracing::debug!("[Container] Output length: {} chars", combined.len());

        Ok(ContainerOutput {
            exit_code,
            output: combined,
        })
    }
}
