// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AES-256-GCM envelope encryption for stored API credentials.
//!
//! Blobs are `base64(nonce || ciphertext || tag)` with a 12-byte random nonce
//! and the 16-byte GCM tag appended by the cipher. No associated data is used.
//! The key is held only by this service and never leaves [`CredentialCipher`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// Size of the encryption key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// GCM authentication tag size in bytes.
pub const TAG_LEN: usize = 16;

/// Smallest valid decoded blob: a nonce plus a tag over an empty plaintext.
pub const MIN_BLOB_LEN: usize = NONCE_LEN + TAG_LEN;

/// Errors from the credential cipher.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("ciphertext failed authentication")]
    Integrity,

    #[error("encryption failed")]
    Encryption,
}

/// AES-256-GCM cipher built once from the configured key.
pub struct CredentialCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl CredentialCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(key_b64: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(key_b64.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("key is not valid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Build a cipher from raw key bytes, which must be exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "key must be exactly {} bytes (256 bits), got {}",
                KEY_LEN,
                bytes.len()
            )));
        }

        let unbound = UnboundKey::new(&AES_256_GCM, bytes)
            .map_err(|_| CryptoError::InvalidKey("key rejected by AES-256-GCM".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a secret, returning `base64(nonce || ciphertext || tag)`.
    ///
    /// Every call draws a fresh random nonce, so encrypting the same secret
    /// twice yields different blobs.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::Encryption)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);

        Ok(BASE64.encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Wrong keys, flipped bits and truncation all fail tag verification and
    /// return [`CryptoError::Integrity`].
    pub fn decrypt(&self, blob_b64: &str) -> Result<String, CryptoError> {
        let raw = BASE64
            .decode(blob_b64)
            .map_err(|e| CryptoError::Malformed(format!("not valid base64: {}", e)))?;

        if raw.len() < MIN_BLOB_LEN {
            return Err(CryptoError::Malformed(format!(
                "blob is {} bytes, need at least {}",
                raw.len(),
                MIN_BLOB_LEN
            )));
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CryptoError::Malformed("bad nonce length".to_string()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Integrity)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::Malformed("plaintext is not UTF-8".to_string()))
    }
}

/// Display-safe hint for a secret, e.g. `sk-...7f3a`.
///
/// The prefix runs through the first `-` when that dash sits after the first
/// character and before the last four; otherwise it is the first two
/// characters. The last four characters are always shown.
pub fn mask_key(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();

    let suffix: String = chars[len.saturating_sub(4)..].iter().collect();

    let prefix: String = match chars.iter().position(|&c| c == '-') {
        Some(dash) if dash > 0 && dash + 4 < len => chars[..=dash].iter().collect(),
        _ => chars.iter().take(2).collect(),
    };

    format!("{}...{}", prefix, suffix)
}
