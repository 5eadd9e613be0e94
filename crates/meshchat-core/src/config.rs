//! Centralized Configuration Management
//!
//! This module consolidates all configuration structures used throughout the
//! routing core so the runtime and CLI can load them from a single document.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

// ----------------------------------------------------------------------------
// Deduplication Configuration
// ----------------------------------------------------------------------------

/// Configuration for the dedup ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// How long a content fingerprint is remembered after insertion
    pub retention_ms: u64,
    /// How long a (kind, peer) presence fingerprint is remembered
    pub presence_window_ms: u64,
    /// Width of the coarse time bucket mixed into content fingerprints
    pub fingerprint_bucket_ms: u64,
    /// Expired entries are swept at most once per interval, on `admit`
    pub cleanup_interval_ms: u64,
    /// Upper bound on remembered fingerprints
    pub max_entries: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention_ms: 300_000,       // 5 minutes
            presence_window_ms: 10_000,  // reconnects after 10s are new events
            fingerprint_bucket_ms: 1_000,
            cleanup_interval_ms: 30_000,
            max_entries: 10_000,
        }
    }
}

impl DedupConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn presence_window(&self) -> Duration {
        Duration::from_millis(self.presence_window_ms)
    }
}

// ----------------------------------------------------------------------------
// Delivery Configuration
// ----------------------------------------------------------------------------

/// Configuration for delivery status tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Maximum number of outgoing messages whose status is tracked
    pub max_tracked: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { max_tracked: 5_000 }
    }
}

// ----------------------------------------------------------------------------
// Roster Configuration
// ----------------------------------------------------------------------------

/// Configuration for message logs and channel rosters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Maximum entries kept per log (public, per channel, per private chat)
    pub max_log_len: usize,
    /// Text recorded in place of channel content that could not be decrypted
    pub undecryptable_placeholder: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            max_log_len: 1_000,
            undecryptable_placeholder: "[unable to decrypt]".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Receipt Configuration
// ----------------------------------------------------------------------------

/// Configuration for outbound acknowledgements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Acknowledge delivery of every accepted private message
    pub send_delivery_acks: bool,
    /// Maximum number of inbound message ids remembered as already receipted
    pub max_remembered: usize,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            send_delivery_acks: true,
            max_remembered: 5_000,
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for CSP channel buffer sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (UI → Router)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Transport → Router)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (Router → external boundaries)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (Router → UI)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // UI commands are infrequent
            event_buffer_size: 256,    // Mesh traffic is bursty and duplicated
            effect_buffer_size: 128,
            app_event_buffer_size: 128,
        }
    }
}

impl ChannelConfig {
    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            command_buffer_size: 10,
            event_buffer_size: 32,
            effect_buffer_size: 32,
            app_event_buffer_size: 32,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            effect_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Unified Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the routing core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub dedup: DedupConfig,
    pub delivery: DeliveryConfig,
    pub roster: RosterConfig,
    pub receipts: ReceiptConfig,
    pub channels: ChannelConfig,
}

impl MeshConfig {
    /// Create configuration for low-memory devices
    pub fn low_memory() -> Self {
        Self {
            dedup: DedupConfig {
                max_entries: 1_000,
                ..DedupConfig::default()
            },
            delivery: DeliveryConfig { max_tracked: 500 },
            roster: RosterConfig {
                max_log_len: 200,
                ..RosterConfig::default()
            },
            receipts: ReceiptConfig {
                max_remembered: 500,
                ..ReceiptConfig::default()
            },
            channels: ChannelConfig::low_memory(),
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            ..Self::default()
        }
    }

    /// Reject configurations the core cannot honour
    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("dedup.retention_ms", self.dedup.retention_ms as usize),
            ("dedup.presence_window_ms", self.dedup.presence_window_ms as usize),
            ("dedup.max_entries", self.dedup.max_entries),
            ("delivery.max_tracked", self.delivery.max_tracked),
            ("roster.max_log_len", self.roster.max_log_len),
            ("channels.command_buffer_size", self.channels.command_buffer_size),
            ("channels.event_buffer_size", self.channels.event_buffer_size),
            ("channels.effect_buffer_size", self.channels.effect_buffer_size),
            ("channels.app_event_buffer_size", self.channels.app_event_buffer_size),
        ];
        if let Some((field, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field: *field }.into());
        }

        if self.dedup.presence_window_ms > self.dedup.retention_ms {
            return Err(ConfigError::WindowOrder {
                field: "dedup.presence_window_ms",
                value: self.dedup.presence_window_ms,
                limit_field: "dedup.retention_ms",
                limit: self.dedup.retention_ms,
            }
            .into());
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
