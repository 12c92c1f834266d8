//! Container runtime abstraction
//!
//! The container tool only needs login, pull and a blocking run that collects
//! output. Anything else about the runtime's lifecycle is out of scope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::AgentResult;

/// Credentials for a container registry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    /// Registry host; the runtime's default registry when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("registry", &self.registry)
            .finish()
    }
}

/// One container execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerJob {
    pub image: String,
    /// Environment variables, in declaration order
    pub env: Vec<(String, String)>,
    /// Shell command run inside the container instead of the image default
    pub command: Option<String>,
    /// Volume mounts in `host:container[:mode]` form
    pub volumes: Vec<String>,
    pub network: Option<String>,
}

/// Result of a finished container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOutput {
    pub exit_code: i32,
    /// Combined stdout and stderr
    pub output: String,
}

impl ContainerOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A container runtime the container tool can drive
///
/// Implementations return `ContainerRuntimeUnavailable` when the runtime
/// itself cannot be reached, and reserve `ToolInvocation` for failures of
/// the job or registry.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Log in to a registry
    async fn login(&self, credentials: &RegistryCredentials) -> AgentResult<()>;

    /// Pull an image
    async fn pull(&self, image: &str) -> AgentResult<()>;

    /// Run a job to completion and collect its output
    async fn run(&self, job: &ContainerJob) -> AgentResult<ContainerOutput>;
}
