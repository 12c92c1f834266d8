use std::env;
use std::io::Write;

use futures::StreamExt;

use agents_manager::agent::{Agent, AgentManager};
use agents_manager::llm::{build_adapter, ModelConfig, Provider};
use agents_manager::logging::{self, LogConfig};
use agents_manager::tools::FunctionTool;

const INSTRUCTION: &str = "You are a helpful assistant. Use the multiply tool for arithmetic.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = logging::init_logging(LogConfig::from_env())?;

    let args: Vec<String> = env::args().skip(1).collect();
    let use_streaming = args.iter().any(|a| a == "--stream" || a == "-s");
    let prompt = args
        .iter()
        .filter(|a| !a.starts_with('-'))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let prompt = if prompt.is_empty() {
        "What is 2 multiplied by 3?".to_string()
    } else {
        prompt
    };

    let provider: Provider = env::var("AGENTS_PROVIDER")
        .unwrap_or_else(|_| "openai".to_string())
        .parse()?;
    let config = ModelConfig::from_env(provider)?;
    tracing::info!("Using {} model {}", provider.as_str(), config.name);

    let multiply = FunctionTool::builder("multiply", "Multiply two integers")
        .param::<i64>("a", "First factor")
        .param::<i64>("b", "Second factor")
        .sync_handler(|args| Ok(args.get::<i64>("a")? * args.get::<i64>("b")?))?;

    let agent = Agent::builder("assistant")
        .instruction(INSTRUCTION)
        .model_arc(build_adapter(&config)?)
        .tool(multiply)
        .build()?;

    let mut manager = AgentManager::new();
    manager.add_agent(agent)?;

    if use_streaming {
        let mut stream = manager.run_stream("assistant", prompt);
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            write!(stdout, "{}", chunk.content)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        let output = manager.run("assistant", prompt).await?;
        println!("{}", output.content);
        tracing::info!("Finished after {} round(s)", output.rounds);
    }

    Ok(())
}
