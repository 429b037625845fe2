//! # AES-256-GCM Encryption
//!
//! Two layers live here:
//!
//! 1. **Raw AEAD** (`encrypt` / `decrypt`) with a random 96-bit nonce and
//!    `nonce || ciphertext || tag` wire format. Used with the shared and
//!    personal encrypting keys for proposal/output messages and wallet names.
//!
//! 2. **Password envelope** ([`PasswordEnvelope`]): PBKDF2-HMAC-SHA256
//!    stretches a password (salt + iteration count) into a 32-byte key,
//!    which then seals the payload with AES-256-GCM. The envelope also
//!    stores a key-check value, `HMAC-SHA256(key, "key-check")`, so that a
//!    wrong password is detected deterministically *before* decryption and
//!    reported as [`EncryptionError::WrongPassword`]. A correct password
//!    that still fails authentication means the ciphertext is corrupt.
//!    Envelopes without a check value can only report
//!    [`EncryptionError::WrongPasswordOrCorruptData`].

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::hash::hmac_sha256;
use crate::config::{
    AES_KEY_LENGTH, AES_NONCE_LENGTH, AES_TAG_LENGTH, DEFAULT_KDF_ITERATIONS, KDF_SALT_LENGTH, MIN_KDF_ITERATIONS,
};

const KEY_CHECK_LABEL: &[u8] = b"key-check";

/// Errors that can occur during encryption/decryption.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("wrong password")]
    WrongPassword,

    #[error("corrupt encrypted data")]
    CorruptData,

    #[error("wrong password or corrupt data")]
    WrongPasswordOrCorruptData,

    #[error("ciphertext too short: must be at least 28 bytes")]
    CiphertextTooShort,

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}

/// Encrypt plaintext with AES-256-GCM using a random nonce.
///
/// Returns `nonce || ciphertext` (the ciphertext carries the 16-byte tag).
///
/// # Example
///
/// ```
/// use merit_wallet_core::crypto::encryption::{encrypt, decrypt};
///
/// let key = [0x42u8; 32];
/// let sealed = encrypt(&key, b"lunch money").unwrap();
/// assert_eq!(decrypt(&key, &sealed).unwrap(), b"lunch money");
/// ```
pub fn encrypt(key: &[u8; AES_KEY_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data previously produced by [`encrypt`].
pub fn decrypt(key: &[u8; AES_KEY_LENGTH], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH + AES_TAG_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| EncryptionError::DecryptFailed)
}

/// Encrypt a UTF-8 message and hex-encode the result for the wire.
pub fn encrypt_message(key: &[u8; AES_KEY_LENGTH], message: &str) -> Result<String, EncryptionError> {
    encrypt(key, message.as_bytes()).map(hex::encode)
}

/// Reverse of [`encrypt_message`].
pub fn decrypt_message(key: &[u8; AES_KEY_LENGTH], sealed_hex: &str) -> Result<String, EncryptionError> {
    let sealed = hex::decode(sealed_hex).map_err(|_| EncryptionError::DecryptFailed)?;
    let plain = decrypt(key, &sealed)?;
    String::from_utf8(plain).map_err(|_| EncryptionError::DecryptFailed)
}

/// Display-oriented decryption: on failure returns `"<ECANNOTDECRYPT>"`
/// so a list view can still render the rest of the proposal.
pub fn decrypt_message_lossy(key: &[u8; AES_KEY_LENGTH], sealed_hex: &str) -> String {
    decrypt_message(key, sealed_hex).unwrap_or_else(|_| "<ECANNOTDECRYPT>".to_string())
}

// ---------------------------------------------------------------------------
// Password Envelope
// ---------------------------------------------------------------------------

/// A password-wrapped payload. Serializes to JSON with hex fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordEnvelope {
    pub version: u8,
    pub iterations: u32,
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded `HMAC-SHA256(key, "key-check")`. Absent on legacy
    /// envelopes, which then cannot distinguish failure causes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Hex-encoded `nonce || ciphertext || tag`.
    pub ciphertext: String,
}

impl PasswordEnvelope {
    /// Seal `plaintext` under `password` with the default iteration count.
    pub fn seal(password: &str, plaintext: &[u8]) -> Result<Self, EncryptionError> {
        Self::seal_with_iterations(password, plaintext, DEFAULT_KDF_ITERATIONS)
    }

    pub fn seal_with_iterations(
        password: &str,
        plaintext: &[u8],
        iterations: u32,
    ) -> Result<Self, EncryptionError> {
        if iterations < MIN_KDF_ITERATIONS {
            return Err(EncryptionError::InvalidEnvelope(format!(
                "iteration count {} below minimum {}",
                iterations, MIN_KDF_ITERATIONS
            )));
        }
        let mut salt = [0u8; KDF_SALT_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let key = stretch(password, &salt, iterations);
        let sealed = encrypt(&key, plaintext)?;
        Ok(Self {
            version: 1,
            iterations,
            salt: hex::encode(salt),
            check: Some(hex::encode(hmac_sha256(&key, KEY_CHECK_LABEL))),
            ciphertext: hex::encode(sealed),
        })
    }

    /// Open the envelope.
    ///
    /// Authenticate-then-decrypt: the key-check value is compared first, so
    /// a wrong password never reaches the cipher.
    pub fn open(&self, password: &str) -> Result<Vec<u8>, EncryptionError> {
        if self.version != 1 {
            return Err(EncryptionError::InvalidEnvelope(format!(
                "unsupported envelope version {}",
                self.version
            )));
        }
        if self.iterations < MIN_KDF_ITERATIONS {
            return Err(EncryptionError::InvalidEnvelope("iteration count too low".into()));
        }
        let salt = hex::decode(&self.salt)
            .map_err(|_| EncryptionError::InvalidEnvelope("salt is not hex".into()))?;
        let sealed = hex::decode(&self.ciphertext)
            .map_err(|_| EncryptionError::InvalidEnvelope("ciphertext is not hex".into()))?;
        let key = stretch(password, &salt, self.iterations);

        match &self.check {
            Some(check_hex) => {
                let expected = hex::decode(check_hex)
                    .map_err(|_| EncryptionError::InvalidEnvelope("check is not hex".into()))?;
                if !constant_time_eq(&expected, &hmac_sha256(&key, KEY_CHECK_LABEL)) {
                    return Err(EncryptionError::WrongPassword);
                }
                decrypt(&key, &sealed).map_err(|_| EncryptionError::CorruptData)
            }
            None => decrypt(&key, &sealed).map_err(|_| EncryptionError::WrongPasswordOrCorruptData),
        }
    }
}

fn stretch(password: &str, salt: &[u8], iterations: u32) -> [u8; AES_KEY_LENGTH] {
    let mut key = [0u8; AES_KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
