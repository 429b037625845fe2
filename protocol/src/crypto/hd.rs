//! # Hierarchical Deterministic Keys (BIP32)
//!
//! Extended private/public keys, child derivation and the base58check
//! `xprv`/`xpub` encodings.
//!
//! Paths use the usual notation: `m/45'/2147483647/0/7`. A trailing `'`
//! (or `h`) marks a hardened index. Public derivation of a hardened index
//! is impossible and reported as [`HdError::HardenedFromPublic`].

use std::fmt;
use std::str::FromStr;

use secp256k1::{Scalar, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::hash::{hash160, hmac_sha512};
use super::keys::{PrivateKey, PublicKey};
use crate::address::Network;
use crate::config::{
    EXTENDED_KEY_LENGTH, HARDENED_OFFSET, LIVENET_XPRV_VERSION, LIVENET_XPUB_VERSION,
    TESTNET_XPRV_VERSION, TESTNET_XPUB_VERSION,
};

/// Errors from extended-key parsing and derivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HdError {
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("cannot derive hardened child from a public key")]
    HardenedFromPublic,

    #[error("derived key is invalid at index {0}; use the next index")]
    InvalidChild(u32),

    #[error("invalid extended key encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid seed length {0}, expected 16..=64 bytes")]
    InvalidSeed(usize),
}

// ---------------------------------------------------------------------------
// DerivationPath
// ---------------------------------------------------------------------------

/// A parsed derivation path: a list of child indexes from the master key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn indexes(&self) -> &[u32] {
        &self.0
    }

    /// Append a child index, returning a new path.
    pub fn child(&self, index: u32) -> Self {
        let mut next = self.0.clone();
        next.push(index);
        Self(next)
    }

    /// Concatenate a relative path onto this one.
    pub fn extend(&self, other: &DerivationPath) -> Self {
        let mut next = self.0.clone();
        next.extend_from_slice(&other.0);
        Self(next)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for DerivationPath {
    type Err = HdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match parts.next() {
            Some("m") | Some("M") => {}
            _ => return Err(HdError::InvalidPath(s.to_string())),
        }
        let mut indexes = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
                Some(d) => (d, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|_| HdError::InvalidPath(s.to_string()))?;
            if index >= HARDENED_OFFSET {
                return Err(HdError::InvalidPath(s.to_string()));
            }
            indexes.push(if hardened { index + HARDENED_OFFSET } else { index });
        }
        Ok(Self(indexes))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for index in &self.0 {
            if *index >= HARDENED_OFFSET {
                write!(f, "/{}'", index - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// ExtendedPrivKey
// ---------------------------------------------------------------------------

/// BIP32 extended private key.
#[derive(Clone)]
pub struct ExtendedPrivKey {
    pub network: Network,
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    key: PrivateKey,
}

impl ExtendedPrivKey {
    /// Master key from a BIP32 seed: `HMAC-SHA512("Bitcoin seed", seed)`.
    pub fn from_seed(network: Network, seed: &[u8]) -> Result<Self, HdError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(HdError::InvalidSeed(seed.len()));
        }
        let i = hmac_sha512(b"Bitcoin seed", seed);
        let key = PrivateKey::from_bytes(&i[..32]).map_err(|_| HdError::InvalidChild(0))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);
        Ok(Self {
            network,
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: 0,
            chain_code,
            key,
        })
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// First four bytes of `HASH160(pubkey)`.
    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key())
    }

    /// Derive a single child.
    pub fn derive_child(&self, index: u32) -> Result<Self, HdError> {
        let mut data = Vec::with_capacity(37);
        if index >= HARDENED_OFFSET {
            data.push(0u8);
            data.extend_from_slice(&self.key.to_bytes());
        } else {
            data.extend_from_slice(&self.public_key().to_bytes());
        }
        data.extend_from_slice(&index.to_be_bytes());

        let i = hmac_sha512(&self.chain_code, &data);
        let mut tweak_bytes = [0u8; 32];
        tweak_bytes.copy_from_slice(&i[..32]);
        let tweak = Scalar::from_be_bytes(tweak_bytes).map_err(|_| HdError::InvalidChild(index))?;
        let child_secret: SecretKey = self
            .key
            .secret()
            .add_tweak(&tweak)
            .map_err(|_| HdError::InvalidChild(index))?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);
        Ok(Self {
            network: self.network,
            depth: self.depth.saturating_add(1),
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code,
            key: PrivateKey::from_secret(child_secret),
        })
    }

    /// Derive along a path. The path is interpreted relative to `self`.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, HdError> {
        path.indexes()
            .iter()
            .try_fold(self.clone(), |key, index| key.derive_child(*index))
    }

    /// Convenience wrapper taking a textual path.
    pub fn derive(&self, path: &str) -> Result<Self, HdError> {
        self.derive_path(&path.parse()?)
    }

    pub fn to_extended_public(&self) -> ExtendedPubKey {
        ExtendedPubKey {
            network: self.network,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            key: self.public_key(),
        }
    }

    fn encode(&self) -> [u8; EXTENDED_KEY_LENGTH] {
        let version = match self.network {
            Network::Livenet => LIVENET_XPRV_VERSION,
            Network::Testnet => TESTNET_XPRV_VERSION,
        };
        let mut key_data = [0u8; 33];
        key_data[1..].copy_from_slice(&self.key.to_bytes());
        encode_extended(
            version,
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            &key_data,
        )
    }
}

impl fmt::Display for ExtendedPrivKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.encode()).with_check().into_string())
    }
}

impl fmt::Debug for ExtendedPrivKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedPrivKey({})", self.to_extended_public())
    }
}

impl FromStr for ExtendedPrivKey {
    type Err = HdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = decode_extended(s)?;
        let network = match raw.version {
            LIVENET_XPRV_VERSION => Network::Livenet,
            TESTNET_XPRV_VERSION => Network::Testnet,
            _ => return Err(HdError::InvalidEncoding("not an extended private key".into())),
        };
        if raw.key_data[0] != 0 {
            return Err(HdError::InvalidEncoding("missing private key prefix".into()));
        }
        let key = PrivateKey::from_bytes(&raw.key_data[1..])
            .map_err(|e| HdError::InvalidEncoding(e.to_string()))?;
        Ok(Self {
            network,
            depth: raw.depth,
            parent_fingerprint: raw.parent_fingerprint,
            child_number: raw.child_number,
            chain_code: raw.chain_code,
            key,
        })
    }
}

// ---------------------------------------------------------------------------
// ExtendedPubKey
// ---------------------------------------------------------------------------

/// BIP32 extended public key.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedPubKey {
    pub network: Network,
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    key: PublicKey,
}

impl ExtendedPubKey {
    pub fn public_key(&self) -> PublicKey {
        self.key
    }

    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.key)
    }

    /// Non-hardened child derivation.
    pub fn derive_child(&self, index: u32) -> Result<Self, HdError> {
        if index >= HARDENED_OFFSET {
            return Err(HdError::HardenedFromPublic);
        }
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.key.to_bytes());
        data.extend_from_slice(&index.to_be_bytes());

        let i = hmac_sha512(&self.chain_code, &data);
        let mut tweak_bytes = [0u8; 32];
        tweak_bytes.copy_from_slice(&i[..32]);
        let tweak = Scalar::from_be_bytes(tweak_bytes).map_err(|_| HdError::InvalidChild(index))?;
        let secp = Secp256k1::verification_only();
        let child = self
            .key
            .inner()
            .add_exp_tweak(&secp, &tweak)
            .map_err(|_| HdError::InvalidChild(index))?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);
        Ok(Self {
            network: self.network,
            depth: self.depth.saturating_add(1),
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code,
            key: PublicKey::from_inner(child),
        })
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, HdError> {
        path.indexes()
            .iter()
            .try_fold(self.clone(), |key, index| key.derive_child(*index))
    }

    pub fn derive(&self, path: &str) -> Result<Self, HdError> {
        self.derive_path(&path.parse()?)
    }

    fn encode(&self) -> [u8; EXTENDED_KEY_LENGTH] {
        let version = match self.network {
            Network::Livenet => LIVENET_XPUB_VERSION,
            Network::Testnet => TESTNET_XPUB_VERSION,
        };
        encode_extended(
            version,
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            &self.key.to_bytes(),
        )
    }
}

impl fmt::Display for ExtendedPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.encode()).with_check().into_string())
    }
}

impl fmt::Debug for ExtendedPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedPubKey({})", self)
    }
}

impl FromStr for ExtendedPubKey {
    type Err = HdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = decode_extended(s)?;
        let network = match raw.version {
            LIVENET_XPUB_VERSION => Network::Livenet,
            TESTNET_XPUB_VERSION => Network::Testnet,
            _ => return Err(HdError::InvalidEncoding("not an extended public key".into())),
        };
        let key = PublicKey::from_slice(&raw.key_data)
            .map_err(|e| HdError::InvalidEncoding(e.to_string()))?;
        Ok(Self {
            network,
            depth: raw.depth,
            parent_fingerprint: raw.parent_fingerprint,
            child_number: raw.child_number,
            chain_code: raw.chain_code,
            key,
        })
    }
}

impl Serialize for ExtendedPubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ExtendedPubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

struct RawExtended {
    version: [u8; 4],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
    key_data: [u8; 33],
}

fn fingerprint_of(key: &PublicKey) -> [u8; 4] {
    let id = hash160(&key.to_bytes());
    [id[0], id[1], id[2], id[3]]
}

fn encode_extended(
    version: [u8; 4],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: &[u8; 32],
    key_data: &[u8; 33],
) -> [u8; EXTENDED_KEY_LENGTH] {
    let mut out = [0u8; EXTENDED_KEY_LENGTH];
    out[0..4].copy_from_slice(&version);
    out[4] = depth;
    out[5..9].copy_from_slice(&parent_fingerprint);
    out[9..13].copy_from_slice(&child_number.to_be_bytes());
    out[13..45].copy_from_slice(chain_code);
    out[45..78].copy_from_slice(key_data);
    out
}

fn decode_extended(s: &str) -> Result<RawExtended, HdError> {
    let bytes = bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|e| HdError::InvalidEncoding(e.to_string()))?;
    if bytes.len() != EXTENDED_KEY_LENGTH {
        return Err(HdError::InvalidEncoding(format!(
            "expected {} bytes, got {}",
            EXTENDED_KEY_LENGTH,
            bytes.len()
        )));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[0..4]);
    let mut parent_fingerprint = [0u8; 4];
    parent_fingerprint.copy_from_slice(&bytes[5..9]);
    let mut child = [0u8; 4];
    child.copy_from_slice(&bytes[9..13]);
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&bytes[13..45]);
    let mut key_data = [0u8; 33];
    key_data.copy_from_slice(&bytes[45..78]);
    Ok(RawExtended {
        version,
        depth: bytes[4],
        parent_fingerprint,
        child_number: u32::from_be_bytes(child),
        chain_code,
        key_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP32 test vector 1.
    const SEED_1: &str = "000102030405060708090a0b0c0d0e0f";
    const M_XPRV: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
    const M_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
    const M_0H_XPRV: &str = "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7";

    fn master() -> ExtendedPrivKey {
        ExtendedPrivKey::from_seed(Network::Livenet, &hex::decode(SEED_1).unwrap()).unwrap()
    }

    #[test]
    fn bip32_vector_1_master() {
        let m = master();
        assert_eq!(m.to_string(), M_XPRV);
        assert_eq!(m.to_extended_public().to_string(), M_XPUB);
    }

    #[test]
    fn bip32_vector_1_hardened_child() {
        let child = master().derive("m/0'").unwrap();
        assert_eq!(child.to_string(), M_0H_XPRV);
        assert_eq!(child.depth, 1);
    }

    #[test]
    fn public_derivation_matches_private() {
        let m = master();
        let account = m.derive("m/44'/0'/0'").unwrap();
        let via_private = account.derive("m/0/5").unwrap().public_key();
        let via_public = account
            .to_extended_public()
            .derive("m/0/5")
            .unwrap()
            .public_key();
        assert_eq!(via_private, via_public);
    }

    #[test]
    fn public_hardened_derivation_fails() {
        let xpub = master().to_extended_public();
        assert_eq!(xpub.derive("m/1'").unwrap_err(), HdError::HardenedFromPublic);
    }

    #[test]
    fn xprv_string_roundtrip() {
        let parsed: ExtendedPrivKey = M_XPRV.parse().unwrap();
        assert_eq!(parsed.to_string(), M_XPRV);
    }

    #[test]
    fn xpub_rejects_xprv_encoding() {
        assert!(M_XPRV.parse::<ExtendedPubKey>().is_err());
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let mut s = M_XPUB.to_string();
        s.pop();
        s.push('9');
        assert!(s.parse::<ExtendedPubKey>().is_err());
    }

    #[test]
    fn path_parse_and_display() {
        let path: DerivationPath = "m/45'/2147483647/0/12".parse().unwrap();
        assert_eq!(path.indexes()[0], 45 + HARDENED_OFFSET);
        assert_eq!(path.to_string(), "m/45'/2147483647/0/12");
        assert!("45/0".parse::<DerivationPath>().is_err());
        assert!("m/x".parse::<DerivationPath>().is_err());
    }

    #[test]
    fn testnet_keys_use_tprv_prefix() {
        let m = ExtendedPrivKey::from_seed(Network::Testnet, &hex::decode(SEED_1).unwrap()).unwrap();
        assert!(m.to_string().starts_with("tprv"));
        assert!(m.to_extended_public().to_string().starts_with("tpub"));
    }
}
