//! Gemini API client
//!
//! Direct HTTP client for the Google Gemini `generateContent` API, translating
//! between the uniform message types and Gemini's contents/parts format.
//!
//! Gemini rejects object schemas that have no properties, at the top level
//! and nested alike. Such objects are declared with a single optional
//! placeholder property, which is stripped again from every function call
//! parsed back. `additionalProperties` is not understood and is dropped.
//!
//! ```ignore
//! let adapter = GeminiAdapter::new("AIza...", "gemini-2.0-flash")?;
//! ```

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
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

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER: &str = "gemini";

/// Parameter injected into empty tool schemas
pub const PLACEHOLDER_PARAM: &str = "_unused";

// ============================================================================
// Gemini-specific request/response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "MAX_TOKENS" => StopReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => StopReason::Refusal,
        _ => StopReason::EndTurn,
    }
}

fn to_usage(usage: &GeminiUsageMetadata) -> Usage {
    Usage {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    }
}

/// Remove the placeholder parameter from parsed call arguments
fn strip_placeholder(args: Value) -> Value {
    match args {
        Value::Null => Value::Object(Map::new()),
        other => strip_nested(other),
    }
}

fn strip_nested(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != PLACEHOLDER_PARAM)
                .map(|(key, value)| (key, strip_nested(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nested).collect()),
        other => other,
    }
}

fn placeholder_property() -> Value {
    json!({
        "type": "string",
        "description": "Not used. Leave empty.",
    })
}

/// Rewrite a parameter schema into the subset Gemini accepts
fn fit_schema(schema: &mut Value) {
    let Some(object) = schema.as_object_mut() else {
        return;
    };
    object.remove("additionalProperties");

    if object.get("type").and_then(Value::as_str) == Some("object") {
        let properties = object
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(properties) = properties.as_object_mut() {
            if properties.is_empty() {
                properties.insert(PLACEHOLDER_PARAM.to_string(), placeholder_property());
            }
            properties.values_mut().for_each(fit_schema);
        }
    }
    if let Some(items) = object.get_mut("items") {
        fit_schema(items);
    }
}

/// Gemini does not assign call ids; synthesize one when absent
fn call_id(call: &GeminiFunctionCall) -> String {
    call.id
        .clone()
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()))
}

// ============================================================================
// GeminiAdapter
// ============================================================================

/// Google Gemini model adapter
pub struct GeminiAdapter {
    client: Client,
    auth: AuthSource,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    api_base: String,
    stream: bool,
}

impl GeminiAdapter {
    /// Create a new adapter with a specific API key
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> AgentResult<Self> {
        Self::with_auth_source(AuthSource::api_key(api_key), model)
    }

    /// Create an adapter with a dynamic auth provider callback
    ///
    /// The `AuthConfig.api_key` is used as the Gemini API key and
    /// `AuthConfig.base_url` (if set) overrides the default API base URL.
    pub fn with_auth_provider<F, Fut>(model: impl Into<String>, provider: F) -> AgentResult<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
    {
        Self::with_auth_source(AuthSource::Dynamic(Arc::new(auth_provider(provider))), model)
    }

    pub fn with_auth_source(auth: AuthSource, model: impl Into<String>) -> AgentResult<Self> {
        let model = model.into();
        auth.validate(PROVIDER)?;
        if model.trim().is_empty() {
            return Err(AgentError::configuration("gemini: model name is required"));
        }
        Ok(Self {
            client: Client::new(),
            auth,
            model,
            max_tokens: None,
            temperature: None,
            api_base: DEFAULT_API_BASE.to_string(),
            stream: false,
        })
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

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
        self
    }

    /// Make blocking runs go through the streaming endpoint
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    // ========================================================================
    // Format conversion: uniform -> Gemini
    // ========================================================================

    /// Convert history to Gemini contents, returning folded system text too
    fn convert_messages(messages: &[Message]) -> (Vec<String>, Vec<GeminiContent>) {
        let mut system = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();

        for message in messages {
            let (role, parts) = match message.role {
                Role::System => {
                    system.push(message.content.clone());
                    continue;
                }
                Role::User => ("user", vec![GeminiPart::text(&message.content)]),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(GeminiPart::text(&message.content));
                    }
                    for call in &message.tool_calls {
                        parts.push(GeminiPart {
                            function_call: Some(GeminiFunctionCall {
                                id: None,
                                name: call.name.clone(),
                                args: match &call.arguments {
                                    Value::Object(_) => call.arguments.clone(),
                                    _ => Value::Object(Map::new()),
                                },
                            }),
                            ..Default::default()
                        });
                    }
                    ("model", parts)
                }
                Role::Tool => {
                    // functionResponse must name the function it answers
                    let name = message
                        .name
                        .clone()
                        .or_else(|| message.tool_call_id.clone())
                        .unwrap_or_default();
                    let response = if message.is_error {
                        json!({ "error": message.content })
                    } else {
                        json!({ "result": message.content })
                    };
                    (
                        "user",
                        vec![GeminiPart {
                            function_response: Some(GeminiFunctionResponse { name, response }),
                            ..Default::default()
                        }],
                    )
                }
            };

            if parts.is_empty() {
                continue;
            }
            contents.push(GeminiContent {
                role: role.to_string(),
                parts,
            });
        }

        (system, Self::merge_consecutive_roles(contents))
    }

    /// Merge consecutive messages with the same role (Gemini requires alternation)
    fn merge_consecutive_roles(contents: Vec<GeminiContent>) -> Vec<GeminiContent> {
        let mut merged: Vec<GeminiContent> = Vec::new();

        for content in contents {
            if let Some(last) = merged.last_mut() {
                if last.role == content.role {
                    last.parts.extend(content.parts);
                    continue;
                }
            }
            merged.push(content);
        }

        merged
    }

    /// Convert tool definitions to function declarations
    fn convert_tools(tools: &[ToolDefinition]) -> Option<Vec<GeminiTool>> {
        if tools.is_empty() {
            return None;
        }

        let declarations = tools
            .iter()
            .map(|tool| {
                let parameters = if tool.parameters.is_empty() {
                    json!({
                        "type": "object",
                        "properties": { PLACEHOLDER_PARAM: placeholder_property() },
                    })
                } else {
                    let mut schema = tool.parameters.to_json_schema();
                    fit_schema(&mut schema);
                    schema
                };
                GeminiFunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters,
                }
            })
            .collect();

        Some(vec![GeminiTool {
            function_declarations: declarations,
        }])
    }

    fn request(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> GeminiRequest {
        let (history_system, contents) = Self::convert_messages(messages);

        let mut system_parts = Vec::new();
        if !instruction.is_empty() {
            system_parts.push(GeminiPart::text(instruction));
        }
        system_parts.extend(history_system.into_iter().map(GeminiPart::text));

        let generation_config = if self.max_tokens.is_some() || self.temperature.is_some() {
            Some(GeminiGenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: self.temperature,
            })
        } else {
            None
        };

        GeminiRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(GeminiSystemInstruction {
                    parts: system_parts,
                })
            },
            tools: Self::convert_tools(tools),
            generation_config,
        }
    }

    // ========================================================================
    // API methods
    // ========================================================================

    async fn endpoint(&self, operation: &str) -> AgentResult<reqwest::RequestBuilder> {
        let auth = self.auth.get_auth(PROVIDER).await?;
        let base = auth.base_url.as_deref().unwrap_or(&self.api_base);
        let url = format!(
            "{}/models/{}:{}",
            base.trim_end_matches('/'),
            self.model,
            operation
        );
        Ok(self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &auth.api_key))
    }

    fn serialize(&self, request: &GeminiRequest) -> AgentResult<Value> {
        serde_json::to_value(request).map_err(|e| {
            AgentError::configuration(format!("failed to serialize Gemini request: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl ModelAdapter for GeminiAdapter {
    async fn generate(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<ModelResponse> {
        tracing::info!("[Gemini] Sending message with tools");
        tracing::debug!("[Gemini] Messages count: {}", messages.len());
        tracing::debug!("[Gemini] Tools count: {}", tools.len());

        let body = self.build_request(instruction, messages, tools)?;
        let builder = self.endpoint("generateContent").await?;
        let response = http::send_json(PROVIDER, builder, &body).await?;
        self.parse_response(response)
    }

    async fn generate_stream(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<EventStream> {
        tracing::info!("[Gemini] Streaming message with tools");

        let body = self.build_request(instruction, messages, tools)?;
        let builder = self.endpoint("streamGenerateContent?alt=sse").await?;
        let mut data = http::open_sse(PROVIDER, builder, &body).await?;

        let stream = async_stream::try_stream! {
            let mut call_index: usize = 0;
            let mut had_function = false;

            while let Some(payload) = data.next().await {
                let payload = payload?;
                let chunk: GeminiResponse = http::parse_event(PROVIDER, &payload)?;

                if let Some(usage) = &chunk.usage_metadata {
                    yield StreamEvent::Usage(to_usage(usage));
                }

                let mut finish: Option<String> = None;
                for candidate in chunk.candidates.unwrap_or_default() {
                    if let Some(content) = candidate.content {
                        for part in content.parts {
                            if let Some(text) = part.text {
                                if part.thought != Some(true) && !text.is_empty() {
                                    yield StreamEvent::TextDelta(text);
                                }
                            }
                            if let Some(call) = part.function_call {
                                let id = call_id(&call);
                                let args = strip_placeholder(call.args);
                                yield StreamEvent::ToolCallStart {
                                    index: call_index,
                                    id,
                                    name: call.name,
                                };
                                yield StreamEvent::ToolCallDelta {
                                    index: call_index,
                                    arguments: args.to_string(),
                                };
                                call_index += 1;
                                had_function = true;
                            }
                        }
                    }
                    if candidate.finish_reason.is_some() {
                        finish = candidate.finish_reason;
                    }
                }

                if let Some(reason) = finish {
                    tracing::info!("[Gemini] Stream: finish_reason={}", reason);
                    let stop_reason = if had_function {
                        StopReason::ToolUse
                    } else {
                        map_finish_reason(&reason)
                    };
                    yield StreamEvent::Done { stop_reason: Some(stop_reason) };
                    break;
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
        let request = self.request(instruction, messages, tools);
        self.serialize(&request)
    }

    fn parse_response(&self, body: Value) -> AgentResult<ModelResponse> {
        let response: GeminiResponse = serde_json::from_value(body).map_err(|e| {
            AgentError::transport(PROVIDER, format!("unexpected response shape: {}", e))
        })?;

        let usage = response.usage_metadata.as_ref().map(to_usage);
        let candidate = match response.candidates.and_then(|c| c.into_iter().next()) {
            Some(candidate) => candidate,
            None => {
                let reason = response
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(AgentError::transport(
                    PROVIDER,
                    format!("no candidates in response (block reason: {})", reason),
                ));
            }
        };

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                if part.thought != Some(true) {
                    content.push_str(&text);
                }
            }
            if let Some(call) = part.function_call {
                let id = call_id(&call);
                tool_calls.push(ToolCall::new(id, call.name, strip_placeholder(call.args)));
            }
        }

        let stop_reason = if tool_calls.is_empty() {
            candidate.finish_reason.as_deref().map(map_finish_reason)
        } else {
            Some(StopReason::ToolUse)
        };

        Ok(ModelResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
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
