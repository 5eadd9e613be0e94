//! Replay scripts: JSON lines of inbound events and UI commands
//!
//! ```text
//! # comments and blank lines are skipped
//! {"command": {"join_channel": {"channel": "#general", "key": null}}}
//! {"event": {"peer_list_updated": {"peers": ["0101010101010101"]}}}
//! ```

use serde::{Deserialize, Serialize};

use meshchat_core::{Command, Event};

use crate::error::{CliError, Result};

/// One step of a replay script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    Event(Event),
    Command(Command),
}

/// Parse a whole script, reporting the first bad line by number
pub fn parse_script(source: &str) -> Result<Vec<ScriptStep>> {
    source
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, text)| {
            serde_json::from_str(text).map_err(|e| CliError::Script {
                line,
                message: e.to_string(),
            })
        })
        .collect()
}
