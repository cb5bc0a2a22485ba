use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use chatgate::config::Config;

/// Chatgate: rate limiting and toxicity filters for chat pipelines.
///
/// Sits between a chat host and the model, refusing request floods and
/// keeping conversations within professional-conduct norms.
#[derive(Parser)]
#[command(name = "chatgate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve inlet/outlet envelopes as newline-delimited JSON on stdin/stdout
    Run,

    /// Show the effective limits and filter chain
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the envelope replies
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chatgate=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let pipeline = chatgate::host::build_pipeline(&config);

    match cli.command {
        Commands::Run => {
            info!(
                toxicity = config.toxicity_enabled(),
                "Starting filter host on stdin/stdout"
            );
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            chatgate::host::serve(&pipeline, stdin, tokio::io::stdout()).await?;
        }

        Commands::Config => {
            chatgate::output::terminal::display_config(&config, &pipeline);
        }
    }

    Ok(())
}
