//! Core types for the MeshChat routing core
//!
//! Peer, message and channel identifiers, plus the millisecond clock that
//! drives dedup retention.

use core::fmt;
use core::ops::{Add, Deref, Sub};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MeshError;

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Opaque, stable identifier for a mesh participant (8 bytes, hex on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId([u8; 8]);

impl PeerId {
    /// Create a new PeerId from 8 bytes
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Create PeerId from the first 8 bytes of a longer identifier
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut id = [0u8; 8];
        let len = core::cmp::min(bytes.len(), 8);
        id[..len].copy_from_slice(&bytes[..len]);
        Self(id)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for PeerId {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean_str = s.strip_prefix("0x").unwrap_or(s);

        let bytes = hex::decode(clean_str).map_err(|_| MeshError::invalid_peer_id(s))?;
        if bytes.is_empty() || bytes.len() > 8 {
            return Err(MeshError::invalid_peer_id(s));
        }

        // Short ids are zero padded
        Ok(Self::from_bytes(&bytes))
    }
}

impl TryFrom<String> for PeerId {
    type Error = MeshError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerId> for String {
    fn from(peer_id: PeerId) -> Self {
        peer_id.to_string()
    }
}

impl Deref for PeerId {
    type Target = [u8; 8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ----------------------------------------------------------------------------
// Message Identifier
// ----------------------------------------------------------------------------

/// Transport-assigned message identifier, stable across relay paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh random message id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ----------------------------------------------------------------------------
// Channel Name
// ----------------------------------------------------------------------------

/// Name of a mesh channel (conventionally `#general`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Create a channel name, adding the leading `#` if missing
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.starts_with('#') {
            Self(name)
        } else {
            Self(format!("#{}", name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ----------------------------------------------------------------------------
// Channel Key
// ----------------------------------------------------------------------------

/// Opaque symmetric channel key, derived and owned by the crypto collaborator.
///
/// The core only carries it to decrypt calls and never inspects it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(Vec<u8>);

impl ChannelKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelKey(<{} bytes>)", self.0.len())
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, other: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(other))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Index of the `bucket_ms`-wide time bucket containing this timestamp
    pub fn bucket(&self, bucket_ms: u64) -> u64 {
        if bucket_ms == 0 {
            0
        } else {
            self.0 / bucket_ms
        }
    }

    /// Get duration since another timestamp
    pub fn duration_since(&self, other: Self) -> core::time::Duration {
        core::time::Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Source of "now" for every time-dependent decision in the core.
///
/// Tests substitute a controllable clock; production uses [`SystemTimeSource`].
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8];
        let peer_id = PeerId::new(bytes);
        assert_eq!(peer_id.as_bytes(), &bytes);

        let from_long = PeerId::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(from_long.as_bytes(), &bytes);
    }

    #[test]
    fn test_peer_id_hex_roundtrip() {
        let peer_id = PeerId::new([0xab, 0xcd, 0, 0, 0, 0, 0, 0x01]);
        let parsed: PeerId = peer_id.to_string().parse().unwrap();
        assert_eq!(parsed, peer_id);

        let prefixed: PeerId = "0xabcd000000000001".parse().unwrap();
        assert_eq!(prefixed, peer_id);

        assert!("not-hex".parse::<PeerId>().is_err());
        assert!("0011223344556677889900".parse::<PeerId>().is_err());
    }

    #[test]
    fn test_short_peer_id_is_zero_padded() {
        let short: PeerId = "0b".parse().unwrap();
        assert_eq!(short, PeerId::new([0x0b, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(String::from(short), "0b00000000000000");
    }

    #[test]
    fn test_channel_name_normalization() {
        assert_eq!(ChannelName::new("general").as_str(), "#general");
        assert_eq!(ChannelName::new("#general").as_str(), "#general");
        assert_eq!(ChannelName::from("mesh"), ChannelName::new("#mesh"));
    }

    #[test]
    fn test_timestamp_buckets() {
        let ts = Timestamp::new(65_500);
        assert_eq!(ts.bucket(1_000), 65);
        assert_eq!(ts.bucket(30_000), 2);
        assert_eq!(ts.bucket(0), 0);
        assert_eq!(Timestamp::new(10) - Timestamp::new(20), 0);
    }

    #[test]
    fn test_channel_key_debug_is_redacted() {
        let key = ChannelKey::new(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", key), "ChannelKey(<3 bytes>)");
    }
}
