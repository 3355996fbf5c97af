use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizgen::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizgen=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            preload,
        } => {
            cli::serve(config, port, host, preload).await?;
        }
        Commands::Generate {
            text,
            questions,
            difficulty,
        } => {
            cli::generate(config, text, questions, difficulty).await?;
        }
        Commands::Pull { repo, output } => {
            cli::pull(config, repo, output).await?;
        }
    }

    Ok(())
}
