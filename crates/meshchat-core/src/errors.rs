//! Error types for the MeshChat routing core
//!
//! Routing anomalies (duplicates, unknown references, blocked senders,
//! undecryptable content) are expected on a lossy mesh and are reported as
//! [`RouteOutcome`](crate::router::RouteOutcome) values, never as errors. The
//! types here cover the infrastructure around the core: the decrypt
//! capability, configuration and the CSP channels.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by the decrypt capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptographicError {
    #[error("Decryption failed for channel {channel}")]
    DecryptionFailed { channel: String },
    #[error("No key known for channel {channel}")]
    MissingChannelKey { channel: String },
}

/// Configuration validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} ({value}ms) must not exceed {limit_field} ({limit}ms)")]
    WindowOrder {
        field: &'static str,
        value: u64,
        limit_field: &'static str,
        limit: u64,
    },
}

// ----------------------------------------------------------------------------
// Core Error
// ----------------------------------------------------------------------------

/// Core error type for the MeshChat routing core
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptographicError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid peer id: {value}")]
    InvalidPeerId { value: String },

    /// Channel communication error (internal to the CSP architecture)
    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl MeshError {
    /// Create an invalid peer id error for the rejected input
    pub fn invalid_peer_id<T: Into<String>>(value: T) -> Self {
        MeshError::InvalidPeerId {
            value: value.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        MeshError::Channel {
            message: message.into(),
        }
    }

    /// Create a serialization error with a message
    pub fn serialization_error<T: Into<String>>(message: T) -> Self {
        MeshError::Serialization {
            message: message.into(),
        }
    }

    /// Create a decryption failure for a channel
    pub fn decryption_failed<T: Into<String>>(channel: T) -> Self {
        MeshError::Crypto(CryptographicError::DecryptionFailed {
            channel: channel.into(),
        })
    }

    /// Whether the error leaves the router task unable to continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, MeshError::Channel { .. } | MeshError::Config(_))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, MeshError>;
pub type MeshResult<T> = Result<T>;
