//! Deckr CLI: the main entry point.
//!
//! Commands:
//! - `run`    : Run one request, streaming thinking steps
//! - `serve`  : Start the HTTP gateway
//! - `tools`  : List built-in tools
//! - `config` : Print, locate or validate configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deckr",
    about = "Deckr: agent runtime for slide deck generation",
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
    /// Run a single request
    Run {
        /// The request text
        #[arg(short, long)]
        message: String,

        /// Side-channel context notes (repeatable)
        #[arg(short, long = "context")]
        context: Vec<String>,

        /// Ask for a JSON answer and print it parsed
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List built-in tools
    Tools,

    /// Configuration (prints the default TOML when no action is given)
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the config file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            message,
            context,
            json,
        } => commands::run::run(message, context, json).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { action } => match action {
            None => commands::config_cmd::default().await?,
            Some(ConfigAction::Show) => commands::config_cmd::show().await?,
            Some(ConfigAction::Path) => commands::config_cmd::path().await?,
            Some(ConfigAction::Validate) => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
