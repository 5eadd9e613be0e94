//! Capability interfaces for collaborators the router calls synchronously
//!
//! Outbound side effects (receipts, notifications, haptics) travel as
//! [`Effect`](crate::channel::Effect) values. Decryption is the one capability
//! whose answer the router needs inline, so it is injected as a trait object.

use crate::errors::CryptographicError;
use crate::types::{ChannelKey, ChannelName};

/// Channel content decryption, provided by the crypto collaborator
pub trait ChannelCipher: Send + Sync {
    /// Decrypt channel ciphertext with the channel's key
    fn decrypt(
        &self,
        ciphertext: &[u8],
        channel: &ChannelName,
        key: &ChannelKey,
    ) -> Result<String, CryptographicError>;
}

/// Cipher for deployments without channel encryption: every decrypt fails,
/// so encrypted channel traffic is logged as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannelCipher;

impl ChannelCipher for NoChannelCipher {
    fn decrypt(
        &self,
        _ciphertext: &[u8],
        channel: &ChannelName,
        _key: &ChannelKey,
    ) -> Result<String, CryptographicError> {
        Err(CryptographicError::DecryptionFailed {
            channel: channel.to_string(),
        })
    }
}

impl<F> ChannelCipher for F
where
    F: Fn(&[u8], &ChannelName, &ChannelKey) -> Result<String, CryptographicError> + Send + Sync,
{
    fn decrypt(
        &self,
        ciphertext: &[u8],
        channel: &ChannelName,
        key: &ChannelKey,
    ) -> Result<String, CryptographicError> {
        self(ciphertext, channel, key)
    }
}
