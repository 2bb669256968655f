//! Sleuth CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive research chat or single-message mode
//! - `init`: Write a default config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "sleuth",
    about = "Sleuth: a conversational research assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the research assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation thread to use (defaults to agent.default_thread)
        #[arg(short, long)]
        thread: Option<String>,

        /// Do not print [trace] lines
        #[arg(long)]
        no_trace: bool,

        /// Print the state keys each node touched
        #[arg(long)]
        show_payload: bool,
    },

    /// Write a default config file to ~/.sleuth/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with the conversation.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            thread,
            no_trace,
            show_payload,
        } => {
            commands::chat::run(commands::chat::ChatOptions {
                message,
                thread,
                no_trace,
                show_payload,
            })
            .await?
        }
        Commands::Init { force } => commands::init::run(force)?,
    }

    Ok(())
}
