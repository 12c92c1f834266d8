#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agents_manager::container::{
    ContainerJob, ContainerOutput, ContainerRuntime, RegistryCredentials,
};
use agents_manager::core::{AgentError, AgentResult};
use agents_manager::llm::{
    EventStream, Message, ModelAdapter, ModelResponse, StreamEvent, ToolCall,
    ToolDefinition, Usage,
};
use agents_manager::tools::FunctionTool;

/// What the scripted adapter saw on one call
#[derive(Debug, Clone)]
pub struct Recorded {
    pub instruction: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// In-memory model that replays a fixed list of responses
pub struct ScriptedAdapter {
    name: String,
    script: Mutex<VecDeque<ModelResponse>>,
    repeat: Option<ModelResponse>,
    requests: Mutex<Vec<Recorded>>,
    prefers_streaming: bool,
}

impl ScriptedAdapter {
    pub fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
        Arc::new(Self {
            name: "scripted".to_string(),
            script: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            prefers_streaming: false,
        })
    }

    /// Returns the same response forever
    pub fn repeating(response: ModelResponse) -> Arc<Self> {
        Arc::new(Self {
            name: "scripted".to_string(),
            script: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
            prefers_streaming: false,
        })
    }

    /// Same script, but blocking runs go through `generate_stream`
    pub fn streaming(responses: Vec<ModelResponse>) -> Arc<Self> {
        Arc::new(Self {
            name: "scripted".to_string(),
            script: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            prefers_streaming: true,
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn next(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<ModelResponse> {
        self.requests.lock().unwrap().push(Recorded {
            instruction: instruction.to_string(),
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });
        match self.script.lock().unwrap().pop_front() {
            Some(response) => Ok(response),
            None => self
                .repeat
                .clone()
                .ok_or_else(|| AgentError::transport("scripted", "script exhausted")),
        }
    }
}

/// Split a response into the events a streaming provider would send
pub fn events_for(response: &ModelResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for word in response.content.split_inclusive(' ') {
        events.push(StreamEvent::TextDelta(word.to_string()));
    }
    for (index, call) in response.tool_calls.iter().enumerate() {
        events.push(StreamEvent::ToolCallStart {
            index,
            id: call.id.clone(),
            name: call.name.clone(),
        });
        let args = call.arguments.to_string();
        let (head, tail) = args.split_at(args.len() / 2);
        events.push(StreamEvent::ToolCallDelta {
            index,
            arguments: head.to_string(),
        });
        events.push(StreamEvent::ToolCallDelta {
            index,
            arguments: tail.to_string(),
        });
    }
    events.push(StreamEvent::Usage(Usage {
        input_tokens: 10,
        output_tokens: 5,
    }));
    events.push(StreamEvent::Done {
        stop_reason: response.stop_reason,
    });
    events
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    async fn generate(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<ModelResponse> {
        self.next(instruction, messages, tools)
    }

    async fn generate_stream(
        &self,
        instruction: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> AgentResult<EventStream> {
        let response = self.next(instruction, messages, tools)?;
        let events: Vec<AgentResult<StreamEvent>> =
            events_for(&response).into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn build_request(
        &self,
        instruction: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> AgentResult<Value> {
        Ok(json!({ "instruction": instruction, "messages": messages }))
    }

    fn parse_response(&self, body: Value) -> AgentResult<ModelResponse> {
        Ok(ModelResponse::text(body["content"].as_str().unwrap_or_default()))
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn prefers_streaming(&self) -> bool {
        self.prefers_streaming
    }
}

pub fn text(content: &str) -> ModelResponse {
    ModelResponse::text(content)
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

pub fn calls(tool_calls: Vec<ToolCall>) -> ModelResponse {
    ModelResponse::with_tool_calls(tool_calls)
}

pub fn multiply_tool() -> FunctionTool {
    FunctionTool::builder("multiply", "Multiply two integers")
        .param::<i64>("a", "First factor")
        .param::<i64>("b", "Second factor")
        .sync_handler(|args| Ok(args.get::<i64>("a")? * args.get::<i64>("b")?))
        .unwrap()
}

/// Container runtime that records jobs and returns a fixed result
pub struct FakeRuntime {
    pub exit_code: i32,
    pub output: String,
    pub unavailable: bool,
    pub jobs: Mutex<Vec<ContainerJob>>,
}

impl FakeRuntime {
    pub fn new(exit_code: i32, output: &str) -> Arc<Self> {
        Arc::new(Self {
            exit_code,
            output: output.to_string(),
            unavailable: false,
            jobs: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            exit_code: 0,
            output: String::new(),
            unavailable: true,
            jobs: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn login(&self, _credentials: &RegistryCredentials) -> AgentResult<()> {
        Ok(())
    }

    async fn pull(&self, _image: &str) -> AgentResult<()> {
        Ok(())
    }

    async fn run(&self, job: &ContainerJob) -> AgentResult<ContainerOutput> {
        if self.unavailable {
            return Err(AgentError::ContainerRuntimeUnavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ));
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(ContainerOutput {
            exit_code: self.exit_code,
            output: self.output.clone(),
        })
    }
}
