//! Channel membership and per-channel message logs
//!
//! Only locally-joined channels are tracked; traffic for any other channel is
//! discarded. Member sets are kept a subset of the connected peer set: new
//! members are only added while connected, and the presence reconciler prunes
//! them on every presence update.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;

use crate::config::RosterConfig;
use crate::errors::{CryptographicError, MeshError, Result};
use crate::message::{Message, MessageContent, MessageLog};
use crate::ports::ChannelCipher;
use crate::types::{ChannelKey, ChannelName, PeerId};

// ----------------------------------------------------------------------------
// Channel
// ----------------------------------------------------------------------------

/// A joined channel
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: ChannelName,
    /// Symmetric key owned by the crypto collaborator, if the channel is protected
    pub key: Option<ChannelKey>,
    pub members: BTreeSet<PeerId>,
    pub log: MessageLog,
}

/// Result of offering a message to the roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended to the channel log
    Appended { decrypt_failed: bool, new_member: bool },
    /// Channel is not joined locally; message discarded
    NotJoined,
}

// ----------------------------------------------------------------------------
// Channel Roster
// ----------------------------------------------------------------------------

/// Joined channels, their members and logs
pub struct ChannelRoster {
    channels: BTreeMap<ChannelName, Channel>,
    cipher: Arc<dyn ChannelCipher>,
    config: RosterConfig,
}

impl ChannelRoster {
    pub fn new(config: RosterConfig, cipher: Arc<dyn ChannelCipher>) -> Self {
        Self {
            channels: BTreeMap::new(),
            cipher,
            config,
        }
    }

    /// Join a channel. Re-joining keeps the log and replaces the key.
    /// Returns true if the channel was not joined before.
    pub fn join(&mut self, name: ChannelName, key: Option<ChannelKey>) -> bool {
        match self.channels.get_mut(&name) {
            Some(channel) => {
                channel.key = key;
                false
            }
            None => {
                let channel = Channel {
                    name: name.clone(),
                    key,
                    members: BTreeSet::new(),
                    log: MessageLog::new(self.config.max_log_len),
                };
                self.channels.insert(name, channel);
                true
            }
        }
    }

    /// Leave a channel, discarding its state
    pub fn leave(&mut self, name: &ChannelName) -> Option<Channel> {
        self.channels.remove(name)
    }

    pub fn is_joined(&self, name: &ChannelName) -> bool {
        self.channels.contains_key(name)
    }

    pub fn channel(&self, name: &ChannelName) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn joined(&self) -> impl Iterator<Item = &ChannelName> {
        self.channels.keys()
    }

    /// Append a channel message if the channel is joined.
    ///
    /// Encrypted content is resolved through the decrypt capability first; on
    /// failure the message is still recorded, with unavailable content. A
    /// connected sender becomes a member of the channel.
    pub fn add_message(
        &mut self,
        name: &ChannelName,
        message: &Message,
        sender: Option<PeerId>,
        connected: &BTreeSet<PeerId>,
    ) -> AddOutcome {
        if !self.channels.contains_key(name) {
            return AddOutcome::NotJoined;
        }

        let mut decrypt_failed = false;
        let recorded = match &message.content {
            MessageContent::Encrypted(ciphertext) => match self.decrypt(ciphertext, name) {
                Ok(plaintext) => message.with_content(MessageContent::Text(plaintext)),
                Err(err) => {
                    tracing::debug!(channel = %name, message_id = %message.id, %err, "channel message undecryptable");
                    decrypt_failed = true;
                    message.with_content(MessageContent::Unavailable)
                }
            },
            _ => message.clone(),
        };

        let Some(channel) = self.channels.get_mut(name) else {
            return AddOutcome::NotJoined;
        };
        channel.log.push(recorded);

        let new_member = match sender {
            Some(peer_id) if connected.contains(&peer_id) => channel.members.insert(peer_id),
            _ => false,
        };

        AddOutcome::Appended {
            decrypt_failed,
            new_member,
        }
    }

    /// Decrypt ciphertext with the named channel's key
    pub fn decrypt(&self, ciphertext: &[u8], name: &ChannelName) -> Result<String> {
        let key = self
            .channels
            .get(name)
            .and_then(|channel| channel.key.as_ref())
            .ok_or_else(|| CryptographicError::MissingChannelKey {
                channel: name.to_string(),
            })?;
        self.cipher
            .decrypt(ciphertext, name, key)
            .map_err(MeshError::from)
    }

    /// Remove a member from one channel. False when the channel or member is
    /// unknown (a soft miss).
    pub fn remove_member(&mut self, name: &ChannelName, peer_id: &PeerId) -> bool {
        self.channels
            .get_mut(name)
            .map(|channel| channel.members.remove(peer_id))
            .unwrap_or(false)
    }

    /// Drop every member not in `connected`; returns the removed pairs
    pub fn retain_connected(&mut self, connected: &BTreeSet<PeerId>) -> Vec<(ChannelName, PeerId)> {
        let mut removed = Vec::new();
        for (name, channel) in self.channels.iter_mut() {
            channel.members.retain(|peer_id| {
                let keep = connected.contains(peer_id);
                if !keep {
                    removed.push((name.clone(), *peer_id));
                }
                keep
            });
        }
        removed
    }

    pub fn members(&self, name: &ChannelName) -> Option<&BTreeSet<PeerId>> {
        self.channels.get(name).map(|channel| &channel.members)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn placeholder(&self) -> &str {
        &self.config.undecryptable_placeholder
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
