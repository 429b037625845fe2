//! # Cryptographic Primitives
//!
//! Everything key- and hash-shaped the wallet engine needs:
//!
//! - **secp256k1 ECDSA** for transaction and request signatures.
//! - **BIP32** extended keys for deterministic key trees.
//! - **SHA-256d / HASH160** for ids and addresses.
//! - **AES-256-GCM** for message encryption and the password envelope
//!   protecting private key material at rest.
//!
//! All of it is a thin, typed wrapper around audited crates.

pub mod encryption;
pub mod hash;
pub mod hd;
pub mod keys;

pub use encryption::{decrypt, encrypt, EncryptionError, PasswordEnvelope};
pub use hash::{double_sha256, hash160, sha256};
pub use hd::{DerivationPath, ExtendedPrivKey, ExtendedPubKey, HdError};
pub use keys::{KeyError, PrivateKey, PublicKey, Signature};
