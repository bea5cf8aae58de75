//! Storyline CLI entry point.

use anyhow::Result;
use clap::Parser;
use storyline::cli::{commands, Cli, Commands};
use storyline::config::{RunOverrides, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&Settings::expand_path(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("storyline={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Execute command
    match cli.command {
        Commands::Generate {
            topic,
            model,
            provider,
            api_key,
            cartesia_api_key,
            with_audio,
            output_dir,
            emit_result,
        } => {
            let options = commands::GenerateOptions {
                topic,
                with_audio,
                emit_result,
                overrides: RunOverrides {
                    model,
                    provider,
                    api_key,
                    cartesia_api_key,
                    output_dir,
                },
            };
            commands::run_generate(options, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, port, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, cli.config.as_deref())?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings, cli.config.as_deref())?;
        }
    }

    Ok(())
}
