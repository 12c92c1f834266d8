mod common;

use serde_json::json;

use agents_manager::agent::{Agent, AgentManager, RunConfig, ToolErrorPolicy, Workflow};
use agents_manager::core::AgentError;
use agents_manager::llm::{Message, Role};
use agents_manager::tools::{FunctionTool, Handoff};

use common::{call, calls, multiply_tool, text, ScriptedAdapter};

#[tokio::test]
async fn test_plain_answer_returned_unchanged() {
    let model = ScriptedAdapter::new(vec![text("Paris is the capital of France.")]);
    let agent = Agent::builder("geo")
        .instruction("Answer geography questions")
        .model_arc(model.clone())
        .build()
        .unwrap();

    let mut manager = AgentManager::new();
    manager.add_agent(agent).unwrap();

    let output = manager.run("geo", "Capital of France?").await.unwrap();
    assert_eq!(output.content, "Paris is the capital of France.");
    assert_eq!(output.rounds, 1);
    assert_eq!(output.agent, "geo");
    assert_eq!(output.messages.len(), 2);
    assert_eq!(output.messages[1].role, Role::Assistant);

    let requests = model.requests();
    assert_eq!(requests[0].instruction, "Answer geography questions");
    assert_eq!(requests[0].messages, vec![Message::user("Capital of France?")]);
}

#[tokio::test]
async fn test_multiply_round_trip() {
    let model = ScriptedAdapter::new(vec![
        calls(vec![call("call_1", "multiply", json!({"a": 2, "b": 3}))]),
        text("2 times 3 is 6."),
    ]);
    let agent = Agent::builder("calculator")
        .instruction("Use tools for arithmetic")
        .model_arc(model.clone())
        .tool(multiply_tool())
        .build()
        .unwrap();

    let mut manager = AgentManager::new();
    manager.add_agent(agent).unwrap();

    let output = manager.run("calculator", "What is 2 * 3?").await.unwrap();
    assert!(output.content.contains('6'));
    assert_eq!(output.rounds, 2);

    let requests = model.requests();
    assert_eq!(requests[0].tool_names, vec!["multiply"]);
    let second = &requests[1].messages;
    assert_eq!(second.len(), 3);
    assert!(second[1].has_tool_calls());
    assert_eq!(second[2].role, Role::Tool);
    assert_eq!(second[2].content, "6");
    assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
    assert!(!second[2].is_error);
}

#[tokio::test]
async fn test_handoff_switches_agent_and_instruction() {
    let model_b = ScriptedAdapter::new(vec![text("Hello from B")]);
    let agent_b = Agent::builder("b")
        .instruction("Original B instruction")
        .model_arc(model_b.clone())
        .tool(multiply_tool())
        .build()
        .unwrap();

    let target = agent_b.clone();
    let transfer = FunctionTool::builder("transfer_to_b", "Hand the conversation to B")
        .sync_handler(move |_| {
            Ok(Handoff::to(target.clone()).with_instruction("You can change the instruction here"))
        })
        .unwrap();

    let model_a = ScriptedAdapter::new(vec![calls(vec![call("call_1", "transfer_to_b", json!({}))])]);
    let agent_a = Agent::builder("a")
        .instruction("Route requests")
        .model_arc(model_a.clone())
        .tool(transfer)
        .build()
        .unwrap();

    let mut manager = AgentManager::new();
    manager.add_agent(agent_a).unwrap();
    manager.add_agent(agent_b.clone()).unwrap();

    let output = manager.run("a", "Talk to B").await.unwrap();
    assert_eq!(output.content, "Hello from B");
    assert_eq!(output.agent, "b");
    assert_eq!(model_a.requests().len(), 1);

    let requests = model_b.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].instruction, "You can change the instruction here");
    assert_eq!(requests[0].tool_names, vec!["multiply"]);
    // History carries over the handoff
    assert_eq!(requests[0].messages.len(), 3);
    assert_eq!(requests[0].messages[2].content, "Transferred to agent b");
    assert_eq!(agent_b.instruction(), "You can change the instruction here");
}

#[tokio::test]
async fn test_batch_after_handoff_uses_previous_tools() {
    let model_b = ScriptedAdapter::new(vec![text("done")]);
    let agent_b = Agent::builder("b").model_arc(model_b).build().unwrap();

    let target = agent_b.clone();
    let transfer = FunctionTool::builder("transfer", "Hand off")
        .sync_handler(move |_| Ok(target.clone()))
        .unwrap();

    let model_a = ScriptedAdapter::new(vec![calls(vec![
        call("call_1", "transfer", json!({})),
        call("call_2", "multiply", json!({"a": 2, "b": 3})),
    ])]);
    let agent_a = Agent::builder("a")
        .model_arc(model_a)
        .tool(transfer)
        .tool(multiply_tool())
        .build()
        .unwrap();

    let mut manager = AgentManager::new();
    manager.add_agent(agent_a).unwrap();

    let output = manager.run("a", "go").await.unwrap();
    let tool_messages: Vec<&Message> = output
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0].content, "Transferred to agent b");
    assert_eq!(tool_messages[1].content, "6");
    assert!(!tool_messages[1].is_error);
}

#[tokio::test]
async fn test_named_handoff_resolution() {
    let model_b = ScriptedAdapter::new(vec![text("reviewed")]);
    let agent_b = Agent::builder("reviewer").model_arc(model_b.clone()).build().unwrap();

    let to_reviewer = FunctionTool::builder("review", "Send to the reviewer")
        .sync_handler(|_| Ok(Handoff::to_named("reviewer").with_instruction("Review it")))
        .unwrap();
    let to_ghost = FunctionTool::builder("ghost", "Send nowhere")
        .sync_handler(|_| Ok(Handoff::to_named("ghost")))
        .unwrap();

    let model_a = ScriptedAdapter::new(vec![
        calls(vec![call("call_1", "review", json!({}))]),
        calls(vec![call("call_2", "ghost", json!({}))]),
    ]);
    let agent_a = Agent::builder("writer")
        .model_arc(model_a)
        .tool(to_reviewer)
        .tool(to_ghost)
        .build()
        .unwrap();

    let mut manager = AgentManager::new();
    manager.add_agent(agent_a).unwrap();
    manager.add_agent(agent_b).unwrap();

    let output = manager.run("writer", "draft").await.unwrap();
    assert_eq!(output.content, "reviewed");
    assert_eq!(model_b.requests()[0].instruction, "Review it");

    let err = manager.run("writer", "draft again").await.unwrap_err();
    assert!(matches!(err, AgentError::Handoff(ref msg) if msg.contains("ghost")));
}

#[tokio::test]
async fn test_budget_exceeded() {
    let model = ScriptedAdapter::repeating(calls(vec![call(
        "call_1",
        "multiply",
        json!({"a": 1, "b": 1}),
    )]));
    let agent = Agent::builder("looper")
        .model_arc(model.clone())
        .tool(multiply_tool())
        .build()
        .unwrap();

    let mut manager = AgentManager::with_config(RunConfig::new().with_max_rounds(3));
    manager.add_agent(agent).unwrap();

    let err = manager.run("looper", "loop forever").await.unwrap_err();
    assert!(matches!(err, AgentError::BudgetExceeded { max_rounds: 3 }));
    assert_eq!(model.requests().len(), 3);
}

#[tokio::test]
async fn test_zero_round_budget_rejected() {
    let model = ScriptedAdapter::new(vec![text("never sent")]);
    let agent = Agent::builder("idle").model_arc(model.clone()).build().unwrap();
    let mut manager = AgentManager::with_config(RunConfig::new().with_max_rounds(0));
    manager.add_agent(agent).unwrap();

    let err = manager.run("idle", "hi").await.unwrap_err();
    assert!(err.is_configuration());
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn test_tool_errors_reported_to_model() {
    let model = ScriptedAdapter::new(vec![
        calls(vec![
            call("call_1", "divide", json!({})),
            call("call_2", "multiply", json!({"a": 2})),
        ]),
        text("Sorry, I could not do that."),
    ]);
    let agent = Agent::builder("calc")
        .model_arc(model.clone())
        .tool(multiply_tool())
        .build()
        .unwrap();

    let mut manager = AgentManager::new();
    manager.add_agent(agent).unwrap();

    let output = manager.run("calc", "1 / 0").await.unwrap();
    assert_eq!(output.content, "Sorry, I could not do that.");

    let second = &model.requests()[1].messages;
    assert!(second[2].is_error);
    assert!(second[2].content.contains("unknown tool 'divide'"));
    assert!(second[3].is_error);
    assert!(second[3].content.contains("'b'"));
}

#[tokio::test]
async fn test_fatal_tool_errors_end_the_run() {
    let strict = FunctionTool::builder("strict", "Always fails")
        .fatal_on_error()
        .sync_handler(|_| -> agents_manager::AgentResult<String> {
            Err(AgentError::tool_invocation("strict", "no way"))
        })
        .unwrap();

    let model = ScriptedAdapter::new(vec![calls(vec![call("call_1", "strict", json!({}))])]);
    let agent = Agent::builder("a")
        .model_arc(model)
        .tool(strict)
        .build()
        .unwrap();
    let mut manager = AgentManager::new();
    manager.add_agent(agent).unwrap();

    let err = manager.run("a", "go").await.unwrap_err();
    assert!(matches!(err, AgentError::ToolInvocation { ref tool, .. } if tool == "strict"));

    // A run-wide fatal policy applies to every tool
    let model = ScriptedAdapter::new(vec![calls(vec![call("call_1", "missing", json!({}))])]);
    let agent = Agent::builder("b").model_arc(model).build().unwrap();
    let mut manager =
        AgentManager::with_config(RunConfig::new().with_tool_error_policy(ToolErrorPolicy::Fatal));
    manager.add_agent(agent).unwrap();

    let err = manager.run("b", "go").await.unwrap_err();
    assert!(err.is_recoverable_tool_error());
}

#[tokio::test]
async fn test_provider_errors_are_fatal() {
    let model = ScriptedAdapter::new(vec![]);
    let agent = Agent::builder("a").model_arc(model).build().unwrap();
    let mut manager = AgentManager::new();
    manager.add_agent(agent).unwrap();

    let err = manager.run("a", "hi").await.unwrap_err();
    assert!(matches!(err, AgentError::ProviderTransport { .. }));
}

#[tokio::test]
async fn test_message_list_input_and_streaming_preference() {
    let model = ScriptedAdapter::streaming(vec![text("collected from a stream")]);
    let agent = Agent::builder("a").model_arc(model.clone()).build().unwrap();
    let mut manager = AgentManager::new();
    manager.add_agent(agent).unwrap();

    let history = vec![
        Message::user("Remember the number 7"),
        Message::assistant("Noted."),
        Message::user("What was it?"),
    ];
    let output = manager.run("a", history.clone()).await.unwrap();
    assert_eq!(output.content, "collected from a stream");
    assert_eq!(model.requests()[0].messages, history);
}

#[test]
fn test_registry_operations() {
    let mut manager = AgentManager::new();
    let build = |name: &str| {
        Agent::builder(name)
            .model_arc(ScriptedAdapter::new(vec![]))
            .build()
            .unwrap()
    };

    manager.add_agent(build("beta")).unwrap();
    manager.add_agent(build("alpha")).unwrap();
    let err = manager.add_agent(build("alpha")).unwrap_err();
    assert!(err.is_configuration());

    assert_eq!(manager.agent_names(), vec!["alpha", "beta"]);
    assert!(manager.get_agent("beta").is_some());
    assert!(manager.remove_agent("beta").is_some());
    assert!(manager.get_agent("beta").is_none());
}

#[tokio::test]
async fn test_unknown_agent_is_configuration_error() {
    let manager = AgentManager::new();
    let err = manager.run("nobody", "hi").await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_workflow_feeds_output_forward() {
    let writer_model = ScriptedAdapter::new(vec![text("first draft")]);
    let editor_model = ScriptedAdapter::new(vec![text("polished draft")]);
    let checker_model = ScriptedAdapter::new(vec![]);

    let mut manager = AgentManager::new();
    manager
        .add_agent(Agent::builder("writer").model_arc(writer_model).build().unwrap())
        .unwrap();
    manager
        .add_agent(Agent::builder("editor").model_arc(editor_model.clone()).build().unwrap())
        .unwrap();
    manager
        .add_agent(Agent::builder("checker").model_arc(checker_model.clone()).build().unwrap())
        .unwrap();

    let workflow = Workflow::new("publish")
        .step("draft", "writer")
        .step("edit", "editor")
        .step_if("check", "checker", |prev| prev.contains("TODO"));

    let result = manager.run_workflow(&workflow, "Write a haiku").await.unwrap();
    assert_eq!(result.content, "polished draft");
    assert_eq!(result.steps.len(), 3);
    assert!(result.step("check").unwrap().skipped());
    assert_eq!(
        editor_model.requests()[0].messages,
        vec![Message::user("first draft")]
    );
    assert!(checker_model.requests().is_empty());

    let missing = Workflow::new("broken").step("only", "nobody");
    let err = manager.run_workflow(&missing, "x").await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_history_trimmed_before_model_call() {
    let model = ScriptedAdapter::new(vec![text("It was 7.")]);
    let agent = Agent::builder("a").model_arc(model.clone()).build().unwrap();
    let mut manager = AgentManager::with_config(RunConfig::new().with_max_history_tokens(40));
    manager.add_agent(agent).unwrap();

    let history = vec![
        Message::user("Some background. ".repeat(20)),
        Message::assistant("Understood. ".repeat(20)),
        Message::user("Remember the number 7"),
        Message::assistant("Noted."),
        Message::user("What was it?"),
    ];
    let output = manager.run("a", history.clone()).await.unwrap();

    let sent = &model.requests()[0].messages;
    assert_eq!(sent, &history[2..].to_vec());
    assert_eq!(output.messages.len(), history.len() + 1);
    assert_eq!(output.messages[..history.len()], history[..]);
}
