//! Authenticated-encryption envelope over a plaintext frame.
//!
//! The nonce is derived from the wall-clock time bucket rather than a
//! per-message counter, because the two ends of the wire share no session
//! state beyond a static key: `bucket = floor(seconds_since_epoch / time_division)`.
//! The 12-byte ChaCha20-Poly1305 nonce places the 8-byte big-endian bucket in
//! its low 8 bytes and the first 4 bytes of the context constant in its high
//! 4 bytes, so the context participates in the nonce without a KDF round per
//! message. A receiver accepts `{N-1, N, N+1}` to tolerate clock skew.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Symmetric key size, in bytes.
pub const KEY_LEN: usize = 32;
/// Application context constant size, in bytes.
pub const CONTEXT_LEN: usize = 8;
/// Poly1305 tag overhead added to every ciphertext.
pub const TAG_OVERHEAD: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key must be exactly {KEY_LEN} bytes, got {0}")]
    BadKeyLength(usize),
    #[error("invalid authentication tag")]
    Reject,
}

/// A loaded symmetric key plus the fixed context constant, ready to encrypt
/// or decrypt frames for a given time division.
pub struct Envelope {
    cipher: ChaCha20Poly1305,
    context: [u8; CONTEXT_LEN],
    time_division: u64,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("context", &self.context)
            .field("time_division", &self.time_division)
            .finish()
    }
}

impl Envelope {
    pub fn new(key: &[u8], context: [u8; CONTEXT_LEN], time_division: u64) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::BadKeyLength(key.len()));
        }
        Ok(Envelope {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
            context,
            time_division,
        })
    }

    /// Encrypt `plaintext` using the current wall-clock time bucket.
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let bucket = current_bucket(self.time_division);
        let nonce = self.make_nonce(bucket);
        self.cipher
            .encrypt(&nonce, plaintext)
            .expect("chacha20poly1305 encryption is infallible for this key/nonce size")
    }

    /// Decrypt `ciphertext`, trying the current bucket and its two neighbors.
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let now = current_bucket(self.time_division);
        for bucket in [now, now.wrapping_sub(1), now.wrapping_add(1)] {
            let nonce = self.make_nonce(bucket);
            if let Ok(pt) = self.cipher.decrypt(&nonce, ciphertext) {
                return Ok(pt);
            }
        }
        Err(CryptoError::Reject)
    }

    fn make_nonce(&self, bucket: u64) -> Nonce {
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&self.context[0..4]);
        bytes[4..12].copy_from_slice(&bucket.to_be_bytes());
        *Nonce::from_slice(&bytes)
    }
}

fn current_bucket(time_division: u64) -> u64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs();
    secs / time_division
}

/// Seal/open against an explicit bucket, used by tests to avoid racing the clock.
#[cfg(test)]
impl Envelope {
    fn seal_at(&self, plaintext: &[u8], bucket: u64) -> Vec<u8> {
        let nonce = self.make_nonce(bucket);
        self.cipher.encrypt(&nonce, plaintext).unwrap()
    }

    fn open_at(&self, ciphertext: &[u8], buckets: &[u64]) -> Result<Vec<u8>, CryptoError> {
        for &bucket in buckets {
            let nonce = self.make_nonce(bucket);
            if let Ok(pt) = self.cipher.decrypt(&nonce, ciphertext) {
                return Ok(pt);
            }
        }
        Err(CryptoError::Reject)
    }
}
