//! Event deduplication with a time-bounded fingerprint ledger
//!
//! The mesh delivers the same logical event over every link a peer is
//! reachable through. Each inbound event is reduced to an [`EventFingerprint`]
//! and admitted at most once per retention window.
//!
//! Retention is measured from first insertion. Once a fingerprint ages out the
//! ledger forgets it, and a copy of the event arriving after that point is
//! admitted again. That late duplicate is an accepted tradeoff for bounded
//! memory, not a bug: the retention window is sized well above realistic relay
//! delays, and acknowledgement handling downstream is idempotent.
//!
//! `max_entries` is a soft cap. Reaching it triggers an early sweep of expired
//! entries, but a fingerprint still inside its window is never dropped to make
//! room: the ledger grows past the cap (with a `warn!`) instead. The next
//! early sweep waits until the ledger has doubled, so a burst of unexpired
//! traffic costs amortized O(1) per admission.

use core::fmt;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::channel::communication::{Event, EventKind};
use crate::config::DedupConfig;
use crate::types::{PeerId, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Event Fingerprint
// ----------------------------------------------------------------------------

/// Deterministic digest identifying a previously-seen event
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventFingerprint([u8; 32]);

/// How long a fingerprint stays in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionClass {
    /// Content events: messages, acks, channel leaves
    Content,
    /// Presence events keyed only on (kind, peer)
    Presence,
}

impl EventFingerprint {
    /// Create a fingerprint from kind, sender, payload digest and time bucket
    pub fn new(kind: EventKind, sender: &[u8], payload: &[u8], time_bucket: u64) -> Self {
        let payload_hash = Sha256::digest(payload);

        let mut hasher = Sha256::new();
        hasher.update([kind.tag()]);
        hasher.update((sender.len() as u32).to_be_bytes());
        hasher.update(sender);
        hasher.update(payload_hash);
        hasher.update(time_bucket.to_be_bytes());

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&hasher.finalize());
        Self(fingerprint)
    }

    /// Fingerprint for a presence event, keyed only on (kind, peer)
    pub fn presence(kind: EventKind, peer_id: PeerId) -> Self {
        Self::new(kind, peer_id.as_bytes(), &[], 0)
    }

    /// Derive the fingerprint of an inbound event.
    ///
    /// Returns `None` for peer-list updates: they replace state wholesale and
    /// are idempotent, so re-applying an identical list is harmless while
    /// rejecting it would break an A → B → A sequence.
    pub fn for_event(event: &Event, bucket_ms: u64) -> Option<(Self, RetentionClass)> {
        let kind = event.kind();
        match event {
            Event::MessageReceived { message } => {
                let sender = match message.sender_peer_id {
                    Some(peer_id) => peer_id.as_bytes().to_vec(),
                    None => message.sender.as_bytes().to_vec(),
                };
                let mut payload = Vec::with_capacity(16 + message.content.fingerprint_bytes().len());
                payload.extend_from_slice(message.id.as_bytes());
                payload.extend_from_slice(message.content.fingerprint_bytes());
                let bucket = message.timestamp.bucket(bucket_ms);
                Some((Self::new(kind, &sender, &payload, bucket), RetentionClass::Content))
            }
            Event::PeerConnected { peer_id, .. } | Event::PeerDisconnected { peer_id, .. } => {
                Some((Self::presence(kind, *peer_id), RetentionClass::Presence))
            }
            Event::PeerListUpdated { .. } => None,
            Event::ChannelLeave {
                channel,
                from,
                timestamp,
            } => Some((
                Self::new(
                    kind,
                    from.as_bytes(),
                    channel.as_str().as_bytes(),
                    timestamp.bucket(bucket_ms),
                ),
                RetentionClass::Content,
            )),
            Event::DeliveryAck {
                message_id, from, ..
            }
            | Event::ReadReceipt {
                message_id, from, ..
            } => Some((
                Self::new(kind, from.as_bytes(), message_id.as_bytes(), 0),
                RetentionClass::Content,
            )),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EventFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventFingerprint({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for EventFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Statistics for deduplication performance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Total admission checks
    pub checked: u64,
    /// Checks rejected as duplicates
    pub duplicates: u64,
    /// Entries dropped because they aged out
    pub expired: u64,
    /// Times the ledger grew past `max_entries` because nothing had expired
    pub overflows: u64,
    /// Number of cleanup sweeps performed
    pub sweeps: u64,
}

impl DedupStats {
    /// Calculate duplicate detection rate
    pub fn duplicate_rate(&self) -> f64 {
        if self.checked == 0 {
            0.0
        } else {
            (self.duplicates as f64) / (self.checked as f64)
        }
    }
}

// ----------------------------------------------------------------------------
// Dedup Ledger
// ----------------------------------------------------------------------------

/// Remembers admitted fingerprints until their retention window elapses.
///
/// Eviction is amortized: `admit` sweeps expired entries at most once per
/// `cleanup_interval_ms` bucket, so the ledger needs no timer of its own.
/// Callers serialize access (the router owns the ledger exclusively), which
/// keeps admission and the state change it guards atomic together.
#[derive(Debug)]
pub struct DedupLedger<T: TimeSource> {
    /// Fingerprint → expiry time
    entries: HashMap<EventFingerprint, Timestamp>,
    config: DedupConfig,
    /// Cleanup bucket of the last sweep
    last_sweep_bucket: u64,
    /// Size at which the next early sweep runs
    high_water: usize,
    stats: DedupStats,
    time_source: T,
}

impl<T: TimeSource> DedupLedger<T> {
    pub fn new(config: DedupConfig, time_source: T) -> Self {
        let last_sweep_bucket = time_source.now().bucket(config.cleanup_interval_ms);
        Self {
            entries: HashMap::new(),
            high_water: config.max_entries,
            config,
            last_sweep_bucket,
            stats: DedupStats::default(),
            time_source,
        }
    }

    /// Admit a content fingerprint. Returns `true` the first time it is seen
    /// within the retention window, `false` for duplicates.
    pub fn admit(&mut self, fingerprint: EventFingerprint) -> bool {
        self.admit_with(fingerprint, RetentionClass::Content)
    }

    /// Admit a fingerprint under the given retention class
    pub fn admit_with(&mut self, fingerprint: EventFingerprint, class: RetentionClass) -> bool {
        let now = self.time_source.now();
        self.stats.checked += 1;
        self.maybe_sweep(now);

        if let Some(expires_at) = self.entries.get(&fingerprint) {
            if *expires_at > now {
                self.stats.duplicates += 1;
                return false;
            }
            // Aged out but not yet swept: counts as never seen
            self.stats.expired += 1;
        }

        if self.entries.len() >= self.high_water && !self.entries.contains_key(&fingerprint) {
            self.relieve_pressure(now);
        }

        let retention_ms = match class {
            RetentionClass::Content => self.config.retention_ms,
            RetentionClass::Presence => self.config.presence_window_ms,
        };
        self.entries.insert(fingerprint, now + retention_ms);
        true
    }

    /// Check whether a fingerprint is currently remembered, without inserting
    pub fn contains(&self, fingerprint: &EventFingerprint) -> bool {
        let now = self.time_source.now();
        self.entries
            .get(fingerprint)
            .map(|expires_at| *expires_at > now)
            .unwrap_or(false)
    }

    /// Sweep once per cleanup bucket boundary
    fn maybe_sweep(&mut self, now: Timestamp) {
        let bucket = now.bucket(self.config.cleanup_interval_ms);
        if bucket != self.last_sweep_bucket {
            self.last_sweep_bucket = bucket;
            self.sweep(now);
        }
    }

    /// Drop every expired entry
    pub fn sweep(&mut self, now: Timestamp) {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        self.stats.expired += (before - self.entries.len()) as u64;
        self.stats.sweeps += 1;
        if self.entries.len() < self.config.max_entries {
            self.high_water = self.config.max_entries;
        }
    }

    /// Early sweep at the high-water mark. Unexpired entries are kept even
    /// when that leaves the ledger over its cap.
    fn relieve_pressure(&mut self, now: Timestamp) {
        self.sweep(now);
        let len = self.entries.len();
        if len >= self.config.max_entries {
            self.high_water = len.saturating_mul(2).max(self.config.max_entries);
            self.stats.overflows += 1;
            tracing::warn!(
                entries = len,
                max_entries = self.config.max_entries,
                "dedup ledger over capacity with no expired fingerprints"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &DedupStats {
        &self.stats
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// The clock admission decisions are made against
    pub fn time_source(&self) -> &T {
        &self.time_source
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
