//! Container-backed tools
//!
//! - `runtime`: the `ContainerRuntime` trait the tool drives
//! - `docker`: a runtime over the Docker CLI
//! - `tool`: `ContainerSpec` and the `ContainerTool` built from it

pub mod docker;
pub mod runtime;
pub mod tool;

pub use docker::DockerCli;
pub use runtime::{ContainerJob, ContainerOutput, ContainerRuntime, RegistryCredentials};
pub use tool::{ContainerSpec, ContainerTool, EnvVarSpec, ReturnTo, RESULT_PLACEHOLDER};
