//! OpenAI chat completions client
//!
//! Also serves OpenAI-compatible endpoints (DeepSeek, Grok/xAI, Llama API),
//! which share the wire format and differ only in base URL and provider name.
//!
//! ```ignore
//! let adapter = OpenAiAdapter::new("sk-...", "gpt-4o-mini")?;
//! let deepseek = OpenAiAdapter::deepseek("sk-...", "deepseek-chat")?;
//! ```

use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

use super::auth::{auth_provider, AuthConfig, AuthSource};
use super::http;
use super::provider::{EventStream, ModelAdapter};
use super::types::{
    parse_arguments, Message, ModelResponse, Role, StopReason, StreamEvent, ToolCall,
    ToolDefinition, Usage,
};
use crate::core::{AgentError, AgentResult};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com";
const GROK_API_BASE: &str = "https://api.x.ai/v1";
const LLAMA_API_BASE: &str = "https://api.llama-api.com";

// ============================================================================
// Wire types (responses)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<ChunkFunction>,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    name: Option<String>,
    arguments: Option<String>,
}

fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::MaxTokens,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "content_filter" => StopReason::Refusal,
        _ => StopReason::EndTurn,
    }
}

fn to_usage(usage: &ChatUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

// ============================================================================
// OpenAiAdapter
// ============================================================================

/// OpenAI chat completions adapter
pub struct OpenAiAdapter {
    client: Client,
    auth: AuthSource,
    provider: String,
    model: String,
    api_base: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    stream: bool,
}

impl OpenAiAdapter {
    /// Create an adapter for api.openai.com
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> AgentResult<Self> {
        Self::compatible("openai", DEFAULT_API_BASE, api_key, model)
    }

    /// DeepSeek preset
    pub fn deepseek(api_key: impl Into<String>, model: impl Into<String>) -> AgentResult<Self> {
        Self::compatible("deepseek", DEEPSEEK_API_BASE, api_key, model)
    }

    /// Grok (xAI) preset
    pub fn grok(api_key: impl Into<String>, model: impl Into<String>) -> AgentResult<Self> {
        Self::compatible("grok", GROK_API_BASE, api_key, model)
    }

    /// Llama API preset
    pub fn llama(api_key: impl Into<String>, model: impl Into<String>) -> AgentResult<Self> {
        Self::compatible("llama", LLAMA_API_BASE, api_key, model)
    }

    /// Any endpoint speaking the chat completions format
    pub fn compatible(
        provider: impl Into<String>,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> AgentResult<Self> {
        Self::with_auth_source(provider, api_base, AuthSource::api_key(api_key), model)
    }

    /// Create an adapter whose credentials are fetched before each request
    pub fn with_auth_provider<F, Fut>(model: impl Into<String>, provider: F) -> AgentResult<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
    {
        Self::with_auth_source(
            "openai",
            DEFAULT_API_BASE,
            AuthSource::Dynamic(Arc::new(auth_provider(provider))),
            model,
        )
    }

    pub fn with_auth_source(
        provider: impl Into<String>,
        api_base: impl Into<String>,
        auth: AuthSource,
        model: impl Into<String>,
    ) -> AgentResult<Self> {
        let provider = provider.into();
        let model = model.into();
        auth.validate(&provider)?;
        if model.trim().is_empty() {
            return Err(AgentError::configuration(format!(
                "{}: model name is required",
                provider
            )));
        }
        Ok(Self {
            client: Client::new(),
            auth,
            provider,
            model,
            api_base: api_base.into(),
            max_tokens: None,
            temperature: None,
            stream: false,
        })
    }

    /// Override the endpoint base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
        self
    }

    /// Set the max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Make blocking runs go through the streaming endpoint
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    // ========================================================================
    // Format conversion: uniform -> OpenAI
    // ========================================================================

    fn convert_message(message: &Message) -> Value {
        match message.role {
            Role::System | Role::User => json!({
                "role": message.role.as_str(),
                "content": message.content,
            }),
            Role::Assistant => {
                let content = if message.content.is_empty() && message.has_tool_calls() {
                    Value::Null
                } else {
                    json!(message.content)
                };
                let mut value = json!({ "role": "assistant", "content": content });
                if message.has_tool_calls() {
                    let calls: Vec<Value> = message
                        .tool_calls
                        .iter()
                        .map(|call| {
                            let arguments = match &call.arguments {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            };
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": { "name": call.name, "arguments": arguments },
                            })
                        })
                        .collect();
                    value["tool_calls"] = json!(calls);
                }
                value
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            }),
        }
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters.to_json_schema(),
                    },
                })
            })
            .collect()
    }

    fn request_body(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        stream: bool,
    ) -> Value {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !instruction.is_empty() {
            wire.push(json!({ "role": "system", "content": instruction }));
        }
        wire.extend(messages.iter().map(Self::convert_message));

        let mut body = json!({
            "model": self.model,
            "messages": wire,
        });
        if !tools.is_empty() {
            body["tools"] = json!(Self::convert_tools(tools));
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn endpoint(&self) -> AgentResult<reqwest::RequestBuilder> {
        let auth = self.auth.get_auth(&self.provider).await?;
        let base = auth.base_url.as_deref().unwrap_or(&self.api_base);
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        Ok(self
            .client
            .post(url)
            .bearer_auth(&auth.api_key)
            .header("Content-Type", "application/json"))
    }
}

#[async_trait::async_trait]
impl ModelAdapter for OpenAiAdapter {
    async fn generate(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<ModelResponse> {
        tracing::info!(
            "[OpenAI] Sending request to {} ({} messages, {} tools)",
            self.provider,
            messages.len(),
            tools.len()
        );
        let body = self.build_request(instruction, messages, tools)?;
        let builder = self.endpoint().await?;
        let response = http::send_json(&self.provider, builder, &body).await?;
        self.parse_response(response)
    }

    async fn generate_stream(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<EventStream> {
        let body = self.request_body(instruction, messages, tools, true);
        let builder = self.endpoint().await?;
        let mut data = http::open_sse(&self.provider, builder, &body).await?;
        let provider = self.provider.clone();

        let stream = async_stream::try_stream! {
            let mut finish: Option<StopReason> = None;
            let mut done = false;

            while let Some(payload) = data.next().await {
                let payload = payload?;
                if payload == "[DONE]" {
                    done = true;
                    break;
                }

                let chunk: ChatChunk = http::parse_event(&provider, &payload)?;
                if let Some(usage) = &chunk.usage {
                    yield StreamEvent::Usage(to_usage(usage));
                }

                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() {
                            yield StreamEvent::TextDelta(text);
                        }
                    }
                    for call in choice.delta.tool_calls.unwrap_or_default() {
                        let (name, arguments) = match call.function {
                            Some(f) => (f.name, f.arguments),
                            None => (None, None),
                        };
                        if call.id.is_some() || name.is_some() {
                            yield StreamEvent::ToolCallStart {
                                index: call.index,
                                id: call.id.unwrap_or_default(),
                                name: name.unwrap_or_default(),
                            };
                        }
                        if let Some(arguments) = arguments.filter(|a| !a.is_empty()) {
                            yield StreamEvent::ToolCallDelta { index: call.index, arguments };
                        }
                    }
                    if let Some(reason) = choice.finish_reason {
                        finish = Some(map_finish_reason(&reason));
                    }
                }
            }

            // Some compatible endpoints close the stream without a [DONE] marker
            if done || finish.is_some() {
                yield StreamEvent::Done { stop_reason: finish };
            }
        };

        Ok(Box::pin(stream))
    }

    fn build_request(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<Value> {
        Ok(self.request_body(instruction, messages, tools, false))
    }

    fn parse_response(&self, body: Value) -> AgentResult<ModelResponse> {
        let response: ChatResponse = serde_json::from_value(body).map_err(|e| {
            AgentError::transport(&self.provider, format!("unexpected response shape: {}", e))
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            AgentError::transport(&self.provider, "no choices in response")
        })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect();

        let stop_reason = if tool_calls.is_empty() {
            choice.finish_reason.as_deref().map(map_finish_reason)
        } else {
            Some(StopReason::ToolUse)
        };

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            stop_reason,
            usage: response.usage.as_ref().map(to_usage),
        })
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn prefers_streaming(&self) -> bool {
        self.stream
    }
}
