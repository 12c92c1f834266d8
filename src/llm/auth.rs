//! Authentication for model provider APIs
//!
//! Supports both static and dynamic authentication:
//! - Static: API key set once at creation
//! - Dynamic: Callback that provides fresh credentials before each request
//!
//! # Example: Dynamic auth with a rotating key
//!
//! ```ignore
//! use agents_manager::llm::{AuthConfig, OpenAiAdapter};
//!
//! let adapter = OpenAiAdapter::with_auth_provider("gpt-4o-mini", || async {
//!     let key = fetch_key_from_vault().await?;
//!     Ok(AuthConfig::new(key))
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::{AgentError, AgentResult};

/// Authentication configuration for API requests
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// API key or token for authentication
    pub api_key: String,
    /// Optional custom base URL (overrides the adapter's endpoint)
    pub base_url: Option<String>,
}

impl AuthConfig {
    /// Create a new auth config with just an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    /// Create a new auth config with API key and custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Some(base_url.into()),
        }
    }
}

/// Boxed future returned by auth providers
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = AgentResult<AuthConfig>> + Send + 'a>>;

/// Provides authentication credentials before each request
pub trait AuthProvider: Send + Sync {
    /// Called before each API request. Implementations handle caching and
    /// refresh internally.
    fn get_auth(&self) -> AuthFuture<'_>;
}

/// Wrapper to implement AuthProvider for async closures
pub struct FnAuthProvider<F> {
    func: F,
}

impl<F, Fut> AuthProvider for FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
{
    fn get_auth(&self) -> AuthFuture<'_> {
        Box::pin((self.func)())
    }
}

/// Create an auth provider from an async closure
pub fn auth_provider<F, Fut>(func: F) -> FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
{
    FnAuthProvider { func }
}

/// Where an adapter gets its credentials from
#[derive(Clone)]
pub enum AuthSource {
    /// Static credentials set at creation time
    Static(AuthConfig),
    /// Dynamic credentials from a provider
    Dynamic(Arc<dyn AuthProvider>),
}

impl std::fmt::Debug for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthSource::Static(_) => write!(f, "AuthSource::Static(..)"),
            AuthSource::Dynamic(_) => write!(f, "AuthSource::Dynamic(..)"),
        }
    }
}

impl AuthSource {
    /// Static source with just an API key
    pub fn api_key(key: impl Into<String>) -> Self {
        AuthSource::Static(AuthConfig::new(key))
    }

    /// Get auth config (either returns static or calls provider)
    pub(crate) async fn get_auth(&self, provider: &str) -> AgentResult<AuthConfig> {
        let config = match self {
            AuthSource::Static(config) => config.clone(),
            AuthSource::Dynamic(auth) => auth.get_auth().await?,
        };
        if config.api_key.trim().is_empty() {
            return Err(AgentError::configuration(format!(
                "{}: empty API key",
                provider
            )));
        }
        Ok(config)
    }

    /// Fail fast when a static key is blank
    pub(crate) fn validate(&self, provider: &str) -> AgentResult<()> {
        match self {
            AuthSource::Static(config) if config.api_key.trim().is_empty() => Err(
                AgentError::configuration(format!("{}: API key is required", provider)),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dynamic_auth_called_per_request() {
        let source = AuthSource::Dynamic(Arc::new(auth_provider(|| async {
            Ok(AuthConfig::with_base_url("fresh", "http://proxy"))
        })));
        let config = source.get_auth("openai").await.unwrap();
        assert_eq!(config.api_key, "fresh");
        assert_eq!(config.base_url.as_deref(), Some("http://proxy"));
    }

    #[test]
    fn test_blank_static_key_rejected() {
        let err = AuthSource::api_key("  ").validate("anthropic").unwrap_err();
        assert!(err.is_configuration());
    }
}
