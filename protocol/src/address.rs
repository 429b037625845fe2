//! # Addresses
//!
//! An address is `base58check(version || hash160)`. The version byte tells
//! both the network and what the 20-byte hash commits to:
//!
//! | Kind                     | Livenet | Testnet | Hash of          |
//! |--------------------------|---------|---------|------------------|
//! | pay-to-pubkey-hash       | 50      | 110     | compressed pubkey|
//! | pay-to-script-hash       | 63      | 125     | redeem script    |
//! | parameterized script hash| 28      | 117     | vault script     |
//!
//! Address derivation never touches the network: the same (network,
//! pubkey-or-script) always yields the same address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{
    HASH160_LENGTH, LIVENET_PARAM_SCRIPT_HASH, LIVENET_PUBKEY_HASH, LIVENET_SCRIPT_HASH,
    TESTNET_PARAM_SCRIPT_HASH, TESTNET_PUBKEY_HASH, TESTNET_SCRIPT_HASH,
};
use crate::crypto::hash::hash160;
use crate::crypto::keys::PublicKey;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58check encoding: {0}")]
    Encoding(String),

    #[error("invalid address length {0}")]
    Length(usize),

    #[error("unknown address version byte {0}")]
    UnknownVersion(u8),

    #[error("address belongs to {found}, expected {expected}")]
    WrongNetwork { expected: Network, found: Network },
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Livenet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Livenet => "livenet",
            Network::Testnet => "testnet",
        }
    }

    /// BIP44 coin type.
    pub fn coin_type(&self) -> u32 {
        match self {
            Network::Livenet => crate::config::LIVENET_COIN_TYPE,
            Network::Testnet => crate::config::TESTNET_COIN_TYPE,
        }
    }

    fn version_byte(&self, kind: AddressKind) -> u8 {
        match (self, kind) {
            (Network::Livenet, AddressKind::PubKeyHash) => LIVENET_PUBKEY_HASH,
            (Network::Livenet, AddressKind::ScriptHash) => LIVENET_SCRIPT_HASH,
            (Network::Livenet, AddressKind::ParamScriptHash) => LIVENET_PARAM_SCRIPT_HASH,
            (Network::Testnet, AddressKind::PubKeyHash) => TESTNET_PUBKEY_HASH,
            (Network::Testnet, AddressKind::ScriptHash) => TESTNET_SCRIPT_HASH,
            (Network::Testnet, AddressKind::ParamScriptHash) => TESTNET_PARAM_SCRIPT_HASH,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "livenet" | "mainnet" => Ok(Network::Livenet),
            "testnet" => Ok(Network::Testnet),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    PubKeyHash,
    ScriptHash,
    ParamScriptHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub network: Network,
    pub kind: AddressKind,
    pub hash: [u8; HASH160_LENGTH],
}

impl Address {
    pub fn from_public_key(network: Network, key: &PublicKey) -> Self {
        Self {
            network,
            kind: AddressKind::PubKeyHash,
            hash: key.key_id(),
        }
    }

    /// P2SH address committing to `redeem_script`.
    pub fn from_script(network: Network, redeem_script: &[u8]) -> Self {
        Self {
            network,
            kind: AddressKind::ScriptHash,
            hash: hash160(redeem_script),
        }
    }

    /// Vault address committing to `script`.
    pub fn from_param_script(network: Network, script: &[u8]) -> Self {
        Self {
            network,
            kind: AddressKind::ParamScriptHash,
            hash: hash160(script),
        }
    }

    pub fn is_script(&self) -> bool {
        !matches!(self.kind, AddressKind::PubKeyHash)
    }

    /// Parse and require a specific network.
    pub fn parse_for(s: &str, network: Network) -> Result<Self, AddressError> {
        let address: Address = s.parse()?;
        if address.network != network {
            return Err(AddressError::WrongNetwork {
                expected: network,
                found: address.network,
            });
        }
        Ok(address)
    }

    fn from_version(version: u8) -> Result<(Network, AddressKind), AddressError> {
        Ok(match version {
            LIVENET_PUBKEY_HASH => (Network::Livenet, AddressKind::PubKeyHash),
            LIVENET_SCRIPT_HASH => (Network::Livenet, AddressKind::ScriptHash),
            LIVENET_PARAM_SCRIPT_HASH => (Network::Livenet, AddressKind::ParamScriptHash),
            TESTNET_PUBKEY_HASH => (Network::Testnet, AddressKind::PubKeyHash),
            TESTNET_SCRIPT_HASH => (Network::Testnet, AddressKind::ScriptHash),
            TESTNET_PARAM_SCRIPT_HASH => (Network::Testnet, AddressKind::ParamScriptHash),
            other => return Err(AddressError::UnknownVersion(other)),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(1 + HASH160_LENGTH);
        payload.push(self.network.version_byte(self.kind));
        payload.extend_from_slice(&self.hash);
        f.write_str(&bs58::encode(payload).with_check().into_string())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .with_check(None)
            .into_vec()
            .map_err(|e| AddressError::Encoding(e.to_string()))?;
        if bytes.len() != 1 + HASH160_LENGTH {
            return Err(AddressError::Length(bytes.len()));
        }
        let (network, kind) = Self::from_version(bytes[0])?;
        let mut hash = [0u8; HASH160_LENGTH];
        hash.copy_from_slice(&bytes[1..]);
        Ok(Self { network, kind, hash })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
