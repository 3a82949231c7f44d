//! `deckr run`: Run a single request and print the answer.

use std::sync::Arc;

use deckr_agent::{
    AgentStreamEvent, ChannelObserver, ExecutionLoop, ResponseFormat, RunRequest,
    SideChannelContext,
};
use deckr_config::AppConfig;
use tokio::sync::mpsc;

pub async fn run(
    message: String,
    context: Vec<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    DECKR_API_KEY=...");
        eprintln!("    GEMINI_API_KEY=...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = deckr_providers::build_from_config(&config)?;
    let registry = Arc::new(deckr_tools::default_registry()?);
    let agent = ExecutionLoop::from_config(&config, provider, registry);

    let format = if json {
        ResponseFormat::Json
    } else {
        ResponseFormat::Text
    };
    let request = RunRequest::new(message)
        .with_context(SideChannelContext::new(context))
        .with_response_format(format);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let result = agent.run(request, ChannelObserver::new(tx)).await;
    // The observer is dropped with the run, which closes the channel.
    let _ = printer.await;

    let outcome = result?;
    match &outcome.structured {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("{}", outcome.final_text),
    }
    eprintln!(
        "  ({} iterations, {} tool calls, {} ms)",
        outcome.metadata.iterations,
        outcome.tool_call_log.len(),
        outcome.metadata.total_execution_ms
    );

    Ok(())
}

/// Step progress goes to stderr so stdout stays clean for the answer.
fn print_event(event: &AgentStreamEvent) {
    match event {
        AgentStreamEvent::StepStarted { step } => eprintln!("  > {}", step.title),
        AgentStreamEvent::StepUpdated { step } => {
            if let Some(line) = step.content.as_deref().and_then(|c| c.lines().last()) {
                eprintln!("    {line}");
            }
        }
        AgentStreamEvent::StepCompleted { step } => eprintln!("  + {}", step.title),
        AgentStreamEvent::Error { message, .. } => eprintln!("  [Error] {message}"),
        _ => {}
    }
}
