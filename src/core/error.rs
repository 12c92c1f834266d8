//! Error types shared by adapters, tools and the execution loop

use thiserror::Error;

/// Why a provider rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// The request body was refused (bad schema, unknown model, ...)
    Malformed,
    /// Credentials were missing, invalid or lacked permission
    Authentication,
}

impl std::fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestErrorKind::Malformed => write!(f, "malformed request"),
            RequestErrorKind::Authentication => write!(f, "authentication failed"),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(", status {}", s)).unwrap_or_default()
}

/// Errors that can occur while configuring or running agents
#[derive(Error, Debug)]
pub enum AgentError {
    /// Bad or missing adapter, agent, or tool setup. Detected before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The container runtime (daemon or CLI) could not be reached
    #[error("configuration error: container runtime unavailable: {0}")]
    ContainerRuntimeUnavailable(String),

    /// The provider rejected the request
    #[error("{provider} rejected the request ({kind}{}): {message}", status_suffix(.status))]
    ProviderRequest {
        provider: String,
        kind: RequestErrorKind,
        status: Option<u16>,
        message: String,
    },

    /// Network failure, timeout, overload or a broken stream
    #[error("transport error talking to {provider}: {message}")]
    ProviderTransport { provider: String, message: String },

    /// A tool failed, got bad arguments, or a container exited non-zero
    #[error("tool '{tool}' failed: {message}")]
    ToolInvocation { tool: String, message: String },

    /// The handoff target could not be resolved
    #[error("handoff failed: {0}")]
    Handoff(String),

    /// The run needed more model rounds than allowed
    #[error("tool-call budget exceeded: no final answer after {max_rounds} rounds")]
    BudgetExceeded { max_rounds: usize },
}

impl AgentError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        AgentError::Configuration(msg.into())
    }

    /// Create a tool invocation error
    pub fn tool_invocation(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        AgentError::ToolInvocation {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a transport error
    pub fn transport(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        AgentError::ProviderTransport {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a request error of the given kind
    pub fn request(
        provider: impl Into<String>,
        kind: RequestErrorKind,
        status: Option<u16>,
        msg: impl Into<String>,
    ) -> Self {
        AgentError::ProviderRequest {
            provider: provider.into(),
            kind,
            status,
            message: msg.into(),
        }
    }

    /// Classify a non-success HTTP status returned by a provider
    pub fn from_status(provider: &str, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::request(provider, RequestErrorKind::Authentication, Some(status), body),
            408 | 429 | 500..=599 => Self::transport(provider, format!("status {}: {}", status, body)),
            _ => Self::request(provider, RequestErrorKind::Malformed, Some(status), body),
        }
    }

    /// Map a reqwest failure onto the transport/request split
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(provider, status.as_u16(), err.to_string()),
            None => Self::transport(provider, err.to_string()),
        }
    }

    /// Whether this error is a configuration problem (including an unreachable runtime)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AgentError::Configuration(_) | AgentError::ContainerRuntimeUnavailable(_)
        )
    }

    /// Whether the loop may feed this error back to the model as a tool result
    pub fn is_recoverable_tool_error(&self) -> bool {
        matches!(self, AgentError::ToolInvocation { .. })
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::BudgetExceeded { max_rounds: 3 };
        assert_eq!(
            err.to_string(),
            "tool-call budget exceeded: no final answer after 3 rounds"
        );

        let err = AgentError::ContainerRuntimeUnavailable("no socket".into());
        assert!(err.to_string().starts_with("configuration error"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            AgentError::from_status("openai", 401, "bad key"),
            AgentError::ProviderRequest { kind: RequestErrorKind::Authentication, .. }
        ));
        assert!(matches!(
            AgentError::from_status("openai", 400, "bad schema"),
            AgentError::ProviderRequest { kind: RequestErrorKind::Malformed, status: Some(400), .. }
        ));
        assert!(matches!(
            AgentError::from_status("openai", 503, "overloaded"),
            AgentError::ProviderTransport { .. }
        ));
    }

    #[test]
    fn test_request_error_display_includes_status() {
        let err = AgentError::from_status("gemini", 400, "properties: should be non-empty");
        let text = err.to_string();
        assert!(text.contains("gemini"));
        assert!(text.contains("status 400"));
        assert!(text.contains("malformed request"));
    }
}
