//! Model configuration and adapter factory

use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

use super::anthropic::AnthropicAdapter;
use super::gemini::GeminiAdapter;
use super::openai::OpenAiAdapter;
use super::provider::ModelAdapter;
use crate::core::{AgentError, AgentResult};

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    DeepSeek,
    Grok,
    Llama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::DeepSeek => "deepseek",
            Provider::Grok => "grok",
            Provider::Llama => "llama",
        }
    }

    /// Prefix of the environment variables read by `ModelConfig::from_env`
    fn env_prefix(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI",
            Provider::Anthropic => "ANTHROPIC",
            Provider::Gemini => "GEMINI",
            Provider::DeepSeek => "DEEPSEEK",
            Provider::Grok => "GROK",
            Provider::Llama => "LLAMA",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = AgentError;

    fn from_str(s: &str) -> AgentResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" => Ok(Provider::Gemini),
            "deepseek" => Ok(Provider::DeepSeek),
            "grok" | "xai" => Ok(Provider::Grok),
            "llama" => Ok(Provider::Llama),
            other => Err(AgentError::configuration(format!(
                "unknown model provider '{}'",
                other
            ))),
        }
    }
}

/// Declarative model configuration
///
/// Unknown keys are rejected when deserializing; missing required values
/// (API key, Anthropic's `max_tokens`) are rejected by `build_adapter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub provider: Provider,
    /// Model name as the provider knows it
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Drive blocking runs through the streaming endpoint
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ModelConfig {
    pub fn new(provider: Provider, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            api_key: None,
            max_tokens: None,
            stream: false,
            base_url: None,
            temperature: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Read configuration for `provider` from environment variables
    ///
    /// Reads from (with `<P>` the upper-case provider name):
    /// - `<P>_API_KEY` (required)
    /// - `<P>_MODEL` (required)
    /// - `<P>_MAX_TOKENS` (optional)
    /// - `<P>_BASE_URL` (optional)
    /// - `<P>_STREAM` (optional, `true`/`1`)
    pub fn from_env(provider: Provider) -> AgentResult<Self> {
        let prefix = provider.env_prefix();
        tracing::info!("Reading {} model configuration from environment", provider.as_str());

        let var = |suffix: &str| env::var(format!("{}_{}", prefix, suffix)).ok();
        let required = |suffix: &str| {
            var(suffix).ok_or_else(|| {
                AgentError::configuration(format!(
                    "{}_{} environment variable not set",
                    prefix, suffix
                ))
            })
        };

        let max_tokens = match var("MAX_TOKENS") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| {
                AgentError::configuration(format!("{}_MAX_TOKENS is not a number: {}", prefix, raw))
            })?),
            None => None,
        };

        Ok(Self {
            provider,
            name: required("MODEL")?,
            api_key: Some(required("API_KEY")?),
            max_tokens,
            stream: var("STREAM")
                .map(|s| matches!(s.trim(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(false),
            base_url: var("BASE_URL"),
            temperature: None,
        })
    }
}

/// Build the adapter described by `config`
pub fn build_adapter(config: &ModelConfig) -> AgentResult<Arc<dyn ModelAdapter>> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        AgentError::configuration(format!("{}: api_key is required", config.provider.as_str()))
    })?;

    let adapter: Arc<dyn ModelAdapter> = match config.provider {
        Provider::Anthropic => {
            let max_tokens = config.max_tokens.ok_or_else(|| {
                AgentError::configuration("anthropic: max_tokens is required")
            })?;
            let mut adapter = AnthropicAdapter::new(api_key, &config.name, max_tokens)?
                .with_streaming(config.stream);
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            if let Some(temperature) = config.temperature {
                adapter = adapter.with_temperature(temperature);
            }
            Arc::new(adapter)
        }
        Provider::Gemini => {
            let mut adapter = GeminiAdapter::new(api_key, &config.name)?.with_streaming(config.stream);
            if let Some(max_tokens) = config.max_tokens {
                adapter = adapter.with_max_tokens(max_tokens);
            }
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            if let Some(temperature) = config.temperature {
                adapter = adapter.with_temperature(temperature);
            }
            Arc::new(adapter)
        }
        Provider::OpenAi | Provider::DeepSeek | Provider::Grok | Provider::Llama => {
            let adapter = match config.provider {
                Provider::DeepSeek => OpenAiAdapter::deepseek(api_key, &config.name)?,
                Provider::Grok => OpenAiAdapter::grok(api_key, &config.name)?,
                Provider::Llama => OpenAiAdapter::llama(api_key, &config.name)?,
                _ => OpenAiAdapter::new(api_key, &config.name)?,
            };
            let mut adapter = adapter.with_streaming(config.stream);
            if let Some(max_tokens) = config.max_tokens {
                adapter = adapter.with_max_tokens(max_tokens);
            }
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            if let Some(temperature) = config.temperature {
                adapter = adapter.with_temperature(temperature);
            }
            Arc::new(adapter)
        }
    };

    tracing::info!(
        "Built {} adapter for model {}",
        adapter.provider_name(),
        adapter.model()
    );
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<ModelConfig, _> = serde_json::from_str(
            r#"{"provider": "openai", "name": "gpt-4o-mini", "api_key": "k", "temprature": 0.2}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let config: ModelConfig = serde_json::from_str(
            r#"{"provider": "deepseek", "name": "deepseek-chat", "api_key": "k", "stream": true}"#,
        )
        .unwrap();
        assert_eq!(config.provider, Provider::DeepSeek);
        assert!(config.stream);

        let adapter = build_adapter(&config).unwrap();
        assert_eq!(adapter.provider_name(), "deepseek");
        assert!(adapter.prefers_streaming());
    }

    #[test]
    fn test_anthropic_requires_max_tokens() {
        let config = ModelConfig::new(Provider::Anthropic, "claude-test").with_api_key("k");
        let err = build_adapter(&config).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("max_tokens"));

        let adapter = build_adapter(&config.with_max_tokens(1024)).unwrap();
        assert_eq!(adapter.provider_name(), "anthropic");
    }

    #[test]
    fn test_missing_api_key() {
        let config = ModelConfig::new(Provider::Gemini, "gemini-test");
        assert!(build_adapter(&config).err().unwrap().is_configuration());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("xai".parse::<Provider>().unwrap(), Provider::Grok);
        assert!("cohere".parse::<Provider>().is_err());
    }
}
