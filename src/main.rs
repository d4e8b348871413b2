//! Tonewarp CLI
//!
//! Command-line interface for the tonewarp coloration engine.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tonewarp::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    info!("Tonewarp v{}", env!("CARGO_PKG_VERSION"));

    let Some(command) = cli.command else {
        println!("Tonewarp v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for available commands");
        return Ok(());
    };

    let config = commands::load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match command {
        Commands::Info { input } => {
            commands::info(config, &input).with_context(|| format!("cannot inspect {}", input.display()))
        }
        Commands::Render {
            input,
            output,
            params,
            export,
            preset,
            presets,
        } => commands::render(
            config,
            &input,
            &output,
            &params,
            &export,
            preset.as_deref(),
            presets.as_deref(),
        )
        .with_context(|| format!("cannot render {}", input.display())),
        Commands::Randomize {
            input,
            output,
            seed,
            export,
        } => commands::randomize(config, &input, &output, seed, &export)
            .with_context(|| format!("cannot render {}", input.display())),
        Commands::Presets { catalog } => {
            commands::list_presets(&catalog).with_context(|| format!("cannot read {}", catalog.display()))
        }
    }
}
