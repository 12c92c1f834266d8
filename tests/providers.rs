mod common;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agents_manager::agent::{Agent, AgentManager};
use agents_manager::llm::{
    build_adapter, AnthropicAdapter, GeminiAdapter, ModelConfig, OpenAiAdapter, Provider,
};
use agents_manager::tools::FunctionTool;

use common::multiply_tool;

async fn run_single(agent: agents_manager::AgentRef, prompt: &str) -> String {
    let name = agent.name().to_string();
    let mut manager = AgentManager::new();
    manager.add_agent(agent).unwrap();
    manager.run(&name, prompt).await.unwrap().content
}

#[tokio::test]
async fn test_openai_multiply_scenario() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": { "name": "multiply", "arguments": "{\"a\":2,\"b\":3}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "2 multiplied by 3 is 6." },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let model = OpenAiAdapter::new("sk-test", "gpt-4o-mini")
        .unwrap()
        .with_base_url(server.uri());
    let agent = Agent::builder("calculator")
        .instruction("Use tools for arithmetic")
        .model(model)
        .tool(multiply_tool())
        .build()
        .unwrap();

    let content = run_single(agent, "What is 2 * 3?").await;
    assert!(content.contains('6'));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let messages = second["messages"].as_array().unwrap();
    let tool_message = messages.last().unwrap();
    assert_eq!(tool_message["role"], "tool");
    assert_eq!(tool_message["tool_call_id"], "call_abc");
    assert_eq!(tool_message["content"], "6");
}

#[tokio::test]
async fn test_anthropic_text_passthrough() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "text", "text": "  Exactly as sent.\n" }],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 5, "output_tokens": 4 }
        })))
        .mount(&server)
        .await;

    let model = AnthropicAdapter::new("ak-test", "claude-test", 1024)
        .unwrap()
        .with_base_url(server.uri());
    let agent = Agent::builder("echo").model(model).build().unwrap();

    assert_eq!(run_single(agent, "hi").await, "  Exactly as sent.\n");
}

#[tokio::test]
async fn test_gemini_empty_parameter_tool() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "ping", "args": { "_unused": "" } } }]
                },
                "finishReason": "STOP"
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "The server said pong." }] },
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;

    let ping = FunctionTool::builder("ping", "Check the server")
        .sync_handler(|args| {
            assert!(args.raw().is_empty());
            Ok("pong")
        })
        .unwrap();
    let model = GeminiAdapter::new("g-test", "gemini-test")
        .unwrap()
        .with_base_url(server.uri());
    let agent = Agent::builder("pinger").model(model).tool(ping).build().unwrap();

    assert_eq!(run_single(agent, "ping it").await, "The server said pong.");

    let requests = server.received_requests().await.unwrap();
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let params = &first["tools"][0]["functionDeclarations"][0]["parameters"];
    assert!(params["properties"]["_unused"].is_object());

    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let response = &second["contents"][2]["parts"][0]["functionResponse"];
    assert_eq!(response["name"], "ping");
    assert_eq!(response["response"]["result"], "pong");
}

#[tokio::test]
async fn test_config_built_adapter_runs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer ds-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "deepseek here" },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let config: ModelConfig = serde_json::from_value(json!({
        "provider": "deepseek",
        "name": "deepseek-chat",
        "api_key": "ds-key",
        "base_url": server.uri()
    }))
    .unwrap();
    assert_eq!(config.provider, Provider::DeepSeek);

    let agent = Agent::builder("ds")
        .model_arc(build_adapter(&config).unwrap())
        .build()
        .unwrap();
    assert_eq!(agent.model().provider_name(), "deepseek");
    assert_eq!(run_single(agent, "who are you?").await, "deepseek here");
}
