//! `sleuth chat`: interactive or single-message research chat.

use sleuth_agent::{CancellationToken, ResearchAgent, SessionStore};
use sleuth_config::AppConfig;
use sleuth_core::message::ThreadId;
use sleuth_telemetry::{AgentTracer, ConsoleSink, LogSink};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub struct ChatOptions {
    pub message: Option<String>,
    pub thread: Option<String>,
    pub no_trace: bool,
    pub show_payload: bool,
}

pub async fn run(opts: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = match sleuth_providers::build_from_config(&config) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!();
            eprintln!("  ERROR: {e}");
            eprintln!();
            eprintln!("  Set SLEUTH_API_KEY (or OPENAI_API_KEY), or add api_key to:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!("  Run `sleuth init` to create a config file.");
            eprintln!();
            return Err(e.into());
        }
    };

    let tools = Arc::new(sleuth_tools::default_registry(&config.tools)?);
    let agent = ResearchAgent::from_config(&config, provider, tools)?
        .with_tracer(build_tracer(&config, &opts));

    let store = SessionStore::new();
    let thread = ThreadId::from(
        opts.thread
            .as_deref()
            .unwrap_or(&config.agent.default_thread),
    );

    if let Some(message) = opts.message {
        let reply = ask(&store, &agent, &thread, &message).await;
        println!("Assistant: {reply}");
        return Ok(());
    }

    println!("Type an empty line to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            break;
        }

        let reply = ask(&store, &agent, &thread, input).await;
        println!("Assistant: {reply}");
        println!();
    }

    Ok(())
}

fn build_tracer(config: &AppConfig, opts: &ChatOptions) -> AgentTracer {
    let mut tracer = AgentTracer::new().with_sink(Arc::new(LogSink));
    if config.trace.enabled && !opts.no_trace {
        let show_payload = opts.show_payload || config.trace.show_payload;
        tracer.add_sink(Arc::new(ConsoleSink::new(show_payload)));
    }
    tracer
}

/// Run one turn. Failures become a visible reply instead of ending the chat.
async fn ask(store: &SessionStore, agent: &ResearchAgent, thread: &ThreadId, message: &str) -> String {
    match store
        .run_turn(agent, thread, message, &CancellationToken::new())
        .await
    {
        Ok(outcome) => outcome.reply,
        Err(e) => {
            warn!(thread = %thread, error = %e, "Turn failed");
            format!("Sorry, I could not finish that request: {e}")
        }
    }
}
