//! Provider-agnostic request and response types
//!
//! Every adapter translates to and from these types at its boundary, so the
//! execution loop never sees a provider's wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ParameterSchema;

// ============================================================================
// Messages
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned (or synthesized) call id
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments, normally a JSON object
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A message in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Text content (tool results are rendered to text)
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Id of the call a tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool a tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether a tool message carries an error
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            is_error: false,
        }
    }

    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, text)
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, text)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, text)
        }
    }

    /// Create a tool result message answering `call`
    pub fn tool_result(call: &ToolCall, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            is_error,
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Check if this is an assistant message carrying tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ============================================================================
// Tool definitions
// ============================================================================

/// Provider-agnostic description of a callable tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Reason why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Model reached a natural stopping point
    EndTurn,
    /// Max tokens reached
    MaxTokens,
    /// Model invoked tools
    ToolUse,
    /// Provider refused (safety, recitation, policy)
    Refusal,
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Uniform result of one model call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Text produced by the model
    pub content: String,
    /// Tool calls requested by the model, in emitted order
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<StopReason>,
    pub usage: Option<Usage>,
}

impl ModelResponse {
    /// A plain text response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_reason: Some(StopReason::EndTurn),
            ..Default::default()
        }
    }

    /// A response requesting tool calls
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            stop_reason: Some(StopReason::ToolUse),
            ..Default::default()
        }
    }

    /// Check if the response requests tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// Uniform streaming event produced by every adapter
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of assistant text
    TextDelta(String),
    /// A tool call begins at `index`
    ToolCallStart {
        index: usize,
        id: String,
        name: String,
    },
    /// A fragment of the JSON arguments of the tool call at `index`
    ToolCallDelta { index: usize, arguments: String },
    /// Final usage numbers
    Usage(Usage),
    /// The turn is complete
    Done { stop_reason: Option<StopReason> },
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Buffers streamed tool-call fragments until the turn completes
///
/// Text is accumulated as well, so the collected response equals what a
/// non-streaming call would have returned.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    calls: Vec<(usize, PartialToolCall)>,
    stop_reason: Option<StopReason>,
    usage: Option<Usage>,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the accumulator
    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(text) => self.content.push_str(text),
            StreamEvent::ToolCallStart { index, id, name } => {
                let call = self.call_at(*index);
                if !id.is_empty() {
                    call.id = id.clone();
                }
                if !name.is_empty() {
                    call.name = name.clone();
                }
            }
            StreamEvent::ToolCallDelta { index, arguments } => {
                self.call_at(*index).arguments.push_str(arguments);
            }
            StreamEvent::Usage(usage) => self.usage = Some(*usage),
            StreamEvent::Done { stop_reason } => {
                self.stop_reason = *stop_reason;
                self.done = true;
            }
        }
    }

    /// Whether the provider signalled the end of the turn
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn call_at(&mut self, index: usize) -> &mut PartialToolCall {
        let pos = match self.calls.iter().position(|(i, _)| *i == index) {
            Some(pos) => pos,
            None => {
                self.calls.push((index, PartialToolCall::default()));
                self.calls.len() - 1
            }
        };
        &mut self.calls[pos].1
    }

    /// Build the final response from everything seen so far
    pub fn finish(self) -> ModelResponse {
        let tool_calls: Vec<ToolCall> = self
            .calls
            .into_iter()
            .map(|(_, call)| ToolCall {
                id: call.id,
                name: call.name,
                arguments: parse_arguments(&call.arguments),
            })
            .collect();

        let stop_reason = if tool_calls.is_empty() {
            self.stop_reason
        } else {
            Some(StopReason::ToolUse)
        };

        ModelResponse {
            content: self.content,
            tool_calls,
            stop_reason,
            usage: self.usage,
        }
    }
}

/// Parse a JSON argument string as sent by OpenAI-style providers.
///
/// Empty strings become `{}`; unparseable text is kept as a JSON string so the
/// tool layer can report it back to the model.
pub fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}
