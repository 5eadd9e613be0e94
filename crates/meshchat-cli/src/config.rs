//! MeshChat CLI Configuration Management
//!
//! Configuration is layered, later layers winning:
//! defaults → `meshchat.toml` → `MESHCHAT_*` environment variables → flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use meshchat_core::{MeshConfig, MessageId, PeerId};

use crate::cli::Cli;
use crate::error::{CliError, Result};

const CONFIG_FILE_NAME: &str = "meshchat.toml";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the MeshChat CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliAppConfig {
    /// Routing core configuration
    pub core: MeshConfig,
    pub cli: CliConfig,
    pub identity: IdentityConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Default log filter when neither MESHCHAT_LOG nor RUST_LOG is set
    pub log_level: String,
    /// How long to wait for the router to process one script step
    pub step_timeout_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            step_timeout_ms: 5_000,
        }
    }
}

/// Identity of the local peer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Fixed peer ID (hex); random when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
}

impl CliAppConfig {
    /// Load every configuration layer for this invocation
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match Self::locate(cli.config.as_deref()) {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)?
            }
            None => {
                info!("Using default configuration");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        config.core.validate()?;
        Ok(config)
    }

    /// Explicit path, else `./meshchat.toml`, else the user config directory
    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("meshchat").join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `MESHCHAT_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(peer_id) = lookup("MESHCHAT_PEER_ID") {
            self.identity.peer_id = Some(peer_id);
        }
        if let Some(level) = lookup("MESHCHAT_LOG_LEVEL") {
            self.cli.log_level = level;
        }
        if let Some(value) = lookup("MESHCHAT_DEDUP_RETENTION_MS") {
            self.core.dedup.retention_ms = parse_env("MESHCHAT_DEDUP_RETENTION_MS", &value)?;
        }
        if let Some(value) = lookup("MESHCHAT_DEDUP_PRESENCE_WINDOW_MS") {
            self.core.dedup.presence_window_ms =
                parse_env("MESHCHAT_DEDUP_PRESENCE_WINDOW_MS", &value)?;
        }
        if let Some(value) = lookup("MESHCHAT_DEDUP_MAX_ENTRIES") {
            self.core.dedup.max_entries = parse_env("MESHCHAT_DEDUP_MAX_ENTRIES", &value)?;
        }
        if let Some(value) = lookup("MESHCHAT_DELIVERY_MAX_TRACKED") {
            self.core.delivery.max_tracked = parse_env("MESHCHAT_DELIVERY_MAX_TRACKED", &value)?;
        }
        if let Some(value) = lookup("MESHCHAT_SEND_DELIVERY_ACKS") {
            self.core.receipts.send_delivery_acks = parse_env("MESHCHAT_SEND_DELIVERY_ACKS", &value)?;
        }
        Ok(())
    }

    /// Apply command-line flags, the highest-priority layer
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(peer_id) = &cli.peer_id {
            self.identity.peer_id = Some(peer_id.clone());
        }
        if let Some(retention_ms) = cli.retention_ms {
            self.core.dedup.retention_ms = retention_ms;
        }
        if cli.no_delivery_acks {
            self.core.receipts.send_delivery_acks = false;
        }
        if cli.verbose {
            self.cli.log_level = "debug".to_string();
        }
    }

    /// The configured peer ID, or a random one
    pub fn peer_id(&self) -> Result<PeerId> {
        match &self.identity.peer_id {
            Some(hex) => Ok(PeerId::from_str(hex)?),
            None => {
                let peer_id = PeerId::from_bytes(&MessageId::new().as_bytes()[..8]);
                debug!(%peer_id, "generated random peer id");
                Ok(peer_id)
            }
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("{} has an invalid value: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = CliAppConfig::from_toml(
            r#"
            [core.dedup]
            retention_ms = 60000

            [identity]
            peer_id = "0102030405060708"
            "#,
        )
        .unwrap();

        assert_eq!(config.core.dedup.retention_ms, 60_000);
        assert_eq!(config.core.dedup.max_entries, MeshConfig::default().dedup.max_entries);
        assert_eq!(config.cli, CliConfig::default());
        assert_eq!(
            config.peer_id().unwrap(),
            PeerId::new([1, 2, 3, 4, 5, 6, 7, 8])
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CliAppConfig::default();
        let encoded = config.to_toml().unwrap();
        assert_eq!(CliAppConfig::from_toml(&encoded).unwrap(), config);
    }

    #[test]
    fn test_env_then_flags() {
        let env: HashMap<&str, &str> = [
            ("MESHCHAT_PEER_ID", "aaaaaaaaaaaaaaaa"),
            ("MESHCHAT_DEDUP_RETENTION_MS", "1000"),
            ("MESHCHAT_SEND_DELIVERY_ACKS", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = CliAppConfig::default();
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.core.dedup.retention_ms, 1_000);
        assert!(!config.core.receipts.send_delivery_acks);

        let cli = Cli::parse_from([
            "meshchat",
            "--peer-id",
            "bbbbbbbbbbbbbbbb",
            "--retention-ms",
            "20000",
            "config",
        ]);
        config.apply_cli(&cli);
        assert_eq!(config.identity.peer_id.as_deref(), Some("bbbbbbbbbbbbbbbb"));
        assert_eq!(config.core.dedup.retention_ms, 20_000);
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = CliAppConfig::default();
        let result = config.apply_env(|key| {
            (key == "MESHCHAT_DEDUP_MAX_ENTRIES").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
