pub mod anthropic;
pub mod auth;
pub mod config;
pub mod gemini;
mod http;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicAdapter;
pub use auth::{auth_provider, AuthConfig, AuthProvider, AuthSource};
pub use config::{build_adapter, ModelConfig, Provider};
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;
pub use provider::{collect_stream, EventStream, ModelAdapter};
pub use types::{
    Message, ModelResponse, Role, StopReason, StreamAccumulator, StreamEvent, ToolCall,
    ToolDefinition, Usage,
};
