//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (defaults to ./meshchat.toml, then the user config dir)
    #[arg(short, long, env = "MESHCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local peer ID (hex, up to 16 characters)
    #[arg(short, long)]
    pub peer_id: Option<String>,

    /// Override the dedup retention window in milliseconds
    #[arg(long)]
    pub retention_ms: Option<u64>,

    /// Disable automatic delivery acks for inbound private messages
    #[arg(long)]
    pub no_delivery_acks: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines script of events and commands through the router
    Replay {
        /// Script file, one `{"event": ...}` or `{"command": ...}` object per line
        script: PathBuf,
        /// Pretty-print the final snapshot
        #[arg(long)]
        pretty: bool,
        /// Do not print the final snapshot
        #[arg(long)]
        no_snapshot: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from([
            "meshchat",
            "--verbose",
            "--peer-id",
            "0102030405060708",
            "replay",
            "script.jsonl",
            "--pretty",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.peer_id.as_deref(), Some("0102030405060708"));
        assert!(matches!(
            cli.command,
            Commands::Replay { pretty: true, no_snapshot: false, .. }
        ));
    }
}
