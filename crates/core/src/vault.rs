//! At-rest encryption for users' Pipefy API tokens.
//!
//! Tokens are sealed with AES-256-GCM under a single server key. The stored
//! form is `hex(nonce || ciphertext)` with a fresh 12-byte nonce per call, so
//! encrypting the same token twice yields different strings.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::Rng;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Key length in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

/// GCM nonce length in bytes.
const NONCE_LENGTH: usize = 12;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Failed to encrypt token")]
    Encryption,

    /// Wrong key, truncated input or tampered ciphertext.
    #[error("Failed to decrypt stored token")]
    Decryption,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Symmetric cipher for secrets stored in the database.
#[derive(Clone)]
pub struct TokenVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault").finish_non_exhaustive()
    }
}

impl TokenVault {
    /// Build a vault from a 64-character hex key.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| VaultError::InvalidKey(format!("not valid hex: {e}")))?;
        if bytes.len() != KEY_LENGTH {
            return Err(VaultError::InvalidKey(format!(
                "expected {KEY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Seal `plaintext`, returning `hex(nonce || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::rng().fill(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| VaultError::Encryption)?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(hex::encode(sealed))
    }

    /// Open a value produced by [`TokenVault::encrypt`].
    pub fn decrypt(&self, sealed: &str) -> Result<String, VaultError> {
        let bytes = hex::decode(sealed).map_err(|_| VaultError::Decryption)?;
        if bytes.len() <= NONCE_LENGTH {
            return Err(VaultError::Decryption);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LENGTH);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Decryption)
    }
}
