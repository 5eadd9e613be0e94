//! MeshChat CLI entry point

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use meshchat_cli::{parse_script, replay, Cli, CliAppConfig, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CliAppConfig::load(&cli).context("failed to load configuration")?;
    setup_logging(&config.cli.log_level);

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Replay {
            script,
            pretty,
            no_snapshot,
        } => {
            let source = std::fs::read_to_string(&script)
                .with_context(|| format!("failed to read script {}", script.display()))?;
            let steps = parse_script(&source)?;
            let report = replay(&config, steps).await.context("replay failed")?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for effect in &report.effects {
                writeln!(out, "{}", serde_json::json!({ "effect": effect }))?;
            }
            for app_event in &report.app_events {
                writeln!(out, "{}", serde_json::json!({ "app_event": app_event }))?;
            }
            if !no_snapshot {
                let snapshot = if pretty {
                    serde_json::to_string_pretty(&*report.snapshot)?
                } else {
                    serde_json::to_string(&*report.snapshot)?
                };
                writeln!(out, "{}", snapshot)?;
            }
        }
    }

    info!("MeshChat CLI exited successfully");
    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
/// `MESHCHAT_LOG` wins over `RUST_LOG`, which wins over the configured level.
fn setup_logging(default_level: &str) {
    let filter = std::env::var("MESHCHAT_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
