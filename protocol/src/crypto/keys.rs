//! # Key Management
//!
//! secp256k1 key wrappers for the wallet engine.
//!
//! - [`PrivateKey`] never implements `Serialize`, `Display` or a revealing
//!   `Debug`. Getting the raw bytes out is an explicit call.
//! - [`PublicKey`] is always compressed (33 bytes) and serializes as hex,
//!   which is how it travels on the wire and inside credentials.
//! - [`Signature`] is a low-S ECDSA signature kept in DER form, because
//!   DER is what ends up inside input scripts and request headers.
//!
//! Message signing (`sign_message`) hashes with SHA-256d first; hash
//! signing (`sign_hash`) takes an already-computed 32-byte digest such as
//! a transaction signature hash.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::{ecdsa, Message, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::hash::{double_sha256, hash160};
use crate::config::{HASH160_LENGTH, PUBLIC_KEY_LENGTH};

/// Errors that can occur during key operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid private key bytes")]
    InvalidPrivateKey,

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// A secp256k1 private key.
///
/// Dropping a `PrivateKey` erases the scalar. Decrypted keys produced by
/// the signing path live only for the duration of one signing call.
pub struct PrivateKey {
    inner: SecretKey,
}

impl PrivateKey {
    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        loop {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            // Out-of-range scalars are astronomically unlikely; retry anyway.
            if let Ok(inner) = SecretKey::from_slice(&bytes) {
                return Self { inner };
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        SecretKey::from_slice(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_secret(inner: SecretKey) -> Self {
        Self { inner }
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.inner
    }

    /// Raw 32-byte scalar. Handle with care.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.secret_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(&secp, &self.inner),
        }
    }

    /// Sign a precomputed 32-byte digest. The result is normalized to low-S.
    pub fn sign_hash(&self, digest: &[u8; 32]) -> Signature {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(*digest);
        let mut sig = secp.sign_ecdsa(&msg, &self.inner);
        sig.normalize_s();
        Signature { inner: sig }
    }

    /// Sign an arbitrary message: `ECDSA(SHA256d(message))`.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.sign_hash(&double_sha256(message))
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self { inner: self.inner }
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.inner.non_secure_erase();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(pub={})", self.public_key())
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PrivateKey {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
}

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        secp256k1::PublicKey::from_slice(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    pub(crate) fn from_inner(inner: secp256k1::PublicKey) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &secp256k1::PublicKey {
        &self.inner
    }

    /// 33-byte compressed encoding.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.inner.serialize()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// `HASH160` of the compressed encoding, a.k.a. the key id.
    pub fn key_id(&self) -> [u8; HASH160_LENGTH] {
        hash160(&self.to_bytes())
    }

    /// Verify a signature over a precomputed digest.
    pub fn verify_hash(&self, digest: &[u8; 32], signature: &Signature) -> bool {
        let secp = Secp256k1::verification_only();
        let msg = Message::from_digest(*digest);
        secp.verify_ecdsa(&msg, &signature.inner, &self.inner).is_ok()
    }

    /// Verify a signature produced by [`PrivateKey::sign_message`].
    pub fn verify_message(&self, message: &[u8], signature: &Signature) -> bool {
        self.verify_hash(&double_sha256(message), signature)
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Public keys order by their compressed byte encoding.
impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A DER-encoded ECDSA signature (without a sighash byte).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    inner: ecdsa::Signature,
}

impl Signature {
    /// Parse a DER signature. High-S signatures are normalized on the way in
    /// so that equality is by value, not by encoding accident.
    pub fn from_der(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut inner = ecdsa::Signature::from_der(bytes).map_err(|_| KeyError::InvalidSignature)?;
        inner.normalize_s();
        Ok(Self { inner })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_der(&bytes)
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.inner.serialize_der().to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_der())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
