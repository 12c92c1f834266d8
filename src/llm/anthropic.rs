//! Anthropic Messages API client
//!
//! `max_tokens` is mandatory for this API, so it is required at construction.
//! Tool results travel as `tool_result` blocks inside user messages.

use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

use super::auth::{auth_provider, AuthConfig, AuthSource};
use super::http;
use super::provider::{EventStream, ModelAdapter};
use super::types::{
    Message, ModelResponse, Role, StopReason, StreamEvent, ToolCall, ToolDefinition, Usage,
};
use crate::core::{AgentError, AgentResult};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";

// ============================================================================
// Wire types (responses and stream events)
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageStartData },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockStart,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: ContentDelta },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop {
        #[allow(dead_code)]
        index: usize,
    },
    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: MessageDeltaData,
        #[serde(default)]
        usage: Option<WireUsage>,
    },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "error")]
    Error { error: StreamErrorDetails },
}

#[derive(Debug, Deserialize)]
struct MessageStartData {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlockStart {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaData {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorDetails {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "max_tokens" => StopReason::MaxTokens,
        "tool_use" => StopReason::ToolUse,
        "refusal" => StopReason::Refusal,
        _ => StopReason::EndTurn,
    }
}

// ============================================================================
// AnthropicAdapter
// ============================================================================

/// Anthropic Messages API adapter
pub struct AnthropicAdapter {
    client: Client,
    auth: AuthSource,
    model: String,
    max_tokens: u32,
    api_base: String,
    temperature: Option<f32>,
    stream: bool,
}

impl AnthropicAdapter {
    /// Create a new adapter with a static API key
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> AgentResult<Self> {
        Self::with_auth_source(AuthSource::api_key(api_key), model, max_tokens)
    }

    /// Create an adapter whose credentials are fetched before each request
    ///
    /// `AuthConfig.base_url` (if set) overrides the default API base URL.
    pub fn with_auth_provider<F, Fut>(
        model: impl Into<String>,
        max_tokens: u32,
        provider: F,
    ) -> AgentResult<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
    {
        Self::with_auth_source(
            AuthSource::Dynamic(Arc::new(auth_provider(provider))),
            model,
            max_tokens,
        )
    }

    pub fn with_auth_source(
        auth: AuthSource,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> AgentResult<Self> {
        let model = model.into();
        auth.validate(PROVIDER)?;
        if model.trim().is_empty() {
            return Err(AgentError::configuration("anthropic: model name is required"));
        }
        if max_tokens == 0 {
            return Err(AgentError::configuration(
                "anthropic: max_tokens is required and must be positive",
            ));
        }
        Ok(Self {
            client: Client::new(),
            auth,
            model,
            max_tokens,
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: None,
            stream: false,
        })
    }

    /// Override the endpoint base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
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
    // Format conversion: uniform -> Anthropic
    // ========================================================================

    /// Convert history to alternating user/assistant turns of content blocks.
    ///
    /// System messages found in the history are folded into the system prompt.
    fn convert_messages(messages: &[Message]) -> (Vec<String>, Vec<Value>) {
        let mut system = Vec::new();
        let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();

        for message in messages {
            let (role, blocks) = match message.role {
                Role::System => {
                    system.push(message.content.clone());
                    continue;
                }
                Role::User => ("user", vec![json!({ "type": "text", "text": message.content })]),
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(json!({ "type": "text", "text": message.content }));
                    }
                    for call in &message.tool_calls {
                        let input = match &call.arguments {
                            Value::Object(_) => call.arguments.clone(),
                            _ => Value::Object(Map::new()),
                        };
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": input,
                        }));
                    }
                    ("assistant", blocks)
                }
                Role::Tool => {
                    let mut block = json!({
                        "type": "tool_result",
                        "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                        "content": message.content,
                    });
                    if message.is_error {
                        block["is_error"] = json!(true);
                    }
                    ("user", vec![block])
                }
            };

            if blocks.is_empty() {
                continue;
            }
            match turns.last_mut() {
                Some((last_role, last_blocks)) if *last_role == role => {
                    last_blocks.extend(blocks)
                }
                _ => turns.push((role, blocks)),
            }
        }

        let wire = turns
            .into_iter()
            .map(|(role, content)| json!({ "role": role, "content": content }))
            .collect();
        (system, wire)
    }

    fn request_body(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        stream: bool,
    ) -> Value {
        let (history_system, wire) = Self::convert_messages(messages);

        let mut system: Vec<&str> = Vec::new();
        if !instruction.is_empty() {
            system.push(instruction);
        }
        system.extend(history_system.iter().map(String::as_str));

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": wire,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters.to_json_schema(),
                    })
                })
                .collect();
            body["tools"] = json!(tools);
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
        let auth = self.auth.get_auth(PROVIDER).await?;
        let base = auth.base_url.as_deref().unwrap_or(&self.api_base);
        let url = format!("{}/messages", base.trim_end_matches('/'));
        Ok(self
            .client
            .post(url)
            .header("x-api-key", &auth.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json"))
    }
}

#[async_trait::async_trait]
impl ModelAdapter for AnthropicAdapter {
    async fn generate(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<ModelResponse> {
        tracing::info!(
            "[Anthropic] Sending request ({} messages, {} tools)",
            messages.len(),
            tools.len()
        );
        let body = self.build_request(instruction, messages, tools)?;
        let builder = self.endpoint().await?;
        let response = http::send_json(PROVIDER, builder, &body).await?;
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
        let mut data = http::open_sse(PROVIDER, builder, &body).await?;

        let stream = async_stream::try_stream! {
            let mut usage = Usage::default();
            let mut stop_reason: Option<StopReason> = None;

            while let Some(payload) = data.next().await {
                let payload = payload?;
                let event: RawStreamEvent = http::parse_event(PROVIDER, &payload)?;

                match event {
                    RawStreamEvent::MessageStart { message } => {
                        if let Some(start) = message.usage {
                            usage.input_tokens = start.input_tokens;
                        }
                    }
                    RawStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                        ContentBlockStart::Text { text } if !text.is_empty() => {
                            yield StreamEvent::TextDelta(text);
                        }
                        ContentBlockStart::ToolUse { id, name } => {
                            yield StreamEvent::ToolCallStart { index, id, name };
                        }
                        _ => {}
                    },
                    RawStreamEvent::ContentBlockDelta { index, delta } => match delta {
                        ContentDelta::TextDelta { text } => {
                            yield StreamEvent::TextDelta(text);
                        }
                        ContentDelta::InputJsonDelta { partial_json } => {
                            yield StreamEvent::ToolCallDelta { index, arguments: partial_json };
                        }
                        ContentDelta::Other => {}
                    },
                    RawStreamEvent::ContentBlockStop { .. } | RawStreamEvent::Ping => {}
                    RawStreamEvent::MessageDelta { delta, usage: delta_usage } => {
                        if let Some(reason) = delta.stop_reason {
                            stop_reason = Some(map_stop_reason(&reason));
                        }
                        if let Some(delta_usage) = delta_usage {
                            usage.output_tokens = delta_usage.output_tokens;
                        }
                    }
                    RawStreamEvent::MessageStop => {
                        yield StreamEvent::Usage(usage);
                        yield StreamEvent::Done { stop_reason };
                        break;
                    }
                    RawStreamEvent::Error { error } => {
                        tracing::error!("[Anthropic] Stream error: {} - {}", error.error_type, error.message);
                        Err::<(), _>(AgentError::transport(
                            PROVIDER,
                            format!("{}: {}", error.error_type, error.message),
                        ))?;
                    }
                }
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
        let response: MessagesResponse = serde_json::from_value(body).map_err(|e| {
            AgentError::transport(PROVIDER, format!("unexpected response shape: {}", e))
        })?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                ResponseBlock::Text { text } => content.push_str(&text),
                ResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input))
                }
                ResponseBlock::Other => {}
            }
        }

        let stop_reason = if tool_calls.is_empty() {
            response.stop_reason.as_deref().map(map_stop_reason)
        } else {
            Some(StopReason::ToolUse)
        };

        Ok(ModelResponse {
            content,
            tool_calls,
            stop_reason,
            usage: response.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn prefers_streaming(&self) -> bool {
        self.stream
    }
}
