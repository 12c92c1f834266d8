//! Model adapter trait
//!
//! Abstracts the model interface so that different providers (OpenAI, Anthropic,
//! Gemini, OpenAI-compatible endpoints) can be used interchangeably by the
//! execution loop.

use futures::stream::Stream;
use futures::StreamExt;
use serde_json::Value;
use std::pin::Pin;

use super::types::{Message, ModelResponse, StreamAccumulator, StreamEvent, ToolDefinition};
use crate::core::{AgentError, AgentResult};

/// Boxed stream of uniform streaming events
pub type EventStream = Pin<Box<dyn Stream<Item = AgentResult<StreamEvent>> + Send>>;

/// Trait for model providers usable by an agent.
///
/// Every adapter works with the same uniform message types. Providers with a
/// different wire format translate internally in `build_request` and
/// `parse_response`, so the loop never branches on provider name.
#[async_trait::async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Send one request and return the complete response.
    async fn generate(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<ModelResponse>;

    /// Send one request over a streamed connection.
    ///
    /// Text arrives as `TextDelta` events; tool calls arrive as start/delta
    /// fragments and the stream ends with `Done`.
    async fn generate_stream(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<EventStream>;

    /// Translate the uniform triple into the provider's JSON request body.
    fn build_request(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<Value>;

    /// Translate a provider JSON response body into the uniform shape.
    fn parse_response(&self, body: Value) -> AgentResult<ModelResponse>;

    /// Get the provider name (e.g., "openai", "gemini").
    fn provider_name(&self) -> &str;

    /// Get the current model name.
    fn model(&self) -> &str;

    /// Whether blocking runs should go through `generate_stream`.
    fn prefers_streaming(&self) -> bool {
        false
    }
}

/// Drain an event stream into a complete response.
///
/// A stream that ends without a `Done` event is treated as broken.
pub async fn collect_stream(provider: &str, mut stream: EventStream) -> AgentResult<ModelResponse> {
    let mut acc = StreamAccumulator::new();
    while let Some(event) = stream.next().await {
        acc.push(&event?);
    }
    if !acc.is_done() {
        return Err(AgentError::transport(
            provider,
            "stream ended before the turn completed",
        ));
    }
    Ok(acc.finish())
}
