//! # Easy-send
//!
//! Pays someone who has no wallet yet. The sender picks a random secret,
//! derives the receiver key from it (plus an optional passphrase) and
//! locks funds to a two-branch script:
//!
//! - **redeem**: whoever holds the secret signs with the receiver key, any
//!   time;
//! - **cancel**: the sender signs with its own key once `timeout` blocks
//!   have passed since the funding transaction confirmed.
//!
//! The secret travels to the receiver out of band as an [`EasyReceipt`].
//! Spending must name its [`SpendPath`] explicitly; a sender key on the
//! redeem path (or vice versa) is refused before anything is signed.

use std::fmt;
use std::str::FromStr;

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::address::{Address, AddressError, Network};
use crate::codec::transaction::SEQUENCE_FINAL;
use crate::codec::{CodecError, OutPoint, Transaction, TxIn, TxOut, SIGHASH_ALL};
use crate::config::{DEFAULT_EASY_SEND_TIMEOUT, DUST_THRESHOLD, PUBLIC_KEY_LENGTH};
use crate::crypto::keys::{KeyError, PrivateKey, PublicKey};
use crate::proposal::fee::{estimate_size, FeeRate};
use crate::script::{
    build_easy_send_out, easy_send_input, EasySendParams, Script, ScriptError, ScriptTemplate, SpendCondition,
};

/// Random secret length in bytes.
pub const SECRET_LENGTH: usize = 16;

const RECEIVER_KDF_ITERATIONS: u32 = 2048;
const RECEIVER_KDF_SALT: &str = "merit-easy-send";

/// Transaction version that enables relative lock-time on inputs.
const CSV_TX_VERSION: i32 = 2;

const RECEIPT_LIVENET: u8 = 0x4c;
const RECEIPT_TESTNET: u8 = 0x54;
const RECEIPT_LENGTH: usize = 1 + SECRET_LENGTH + PUBLIC_KEY_LENGTH + 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EasySendError {
    #[error("invalid easy-send receipt: {0}")]
    InvalidReceipt(String),

    #[error("could not build transaction: {0}")]
    CouldNotBuildTransaction(String),

    #[error("nothing to spend")]
    NoFunds,

    #[error("funds {available} do not cover the fee {fee}")]
    InsufficientFunds { available: u64, fee: u64 },

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
}

/// Derive the receiver key from the secret and passphrase.
pub fn receiver_key(secret: &[u8; SECRET_LENGTH], passphrase: &str) -> Result<PrivateKey, EasySendError> {
    let salt = format!("{}{}", RECEIVER_KDF_SALT, passphrase);
    let mut seed = [0u8; 32];
    pbkdf2_hmac::<Sha256>(secret, salt.as_bytes(), RECEIVER_KDF_ITERATIONS, &mut seed);
    Ok(PrivateKey::from_bytes(&seed)?)
}

/// The sender's view of an easy-send.
#[derive(Clone, PartialEq, Eq)]
pub struct EasySend {
    secret: [u8; SECRET_LENGTH],
    params: EasySendParams,
    network: Network,
}

impl EasySend {
    /// New commitment with a fresh random secret. `timeout` defaults to
    /// roughly one week of blocks.
    pub fn create(
        sender_pub_key: PublicKey,
        passphrase: &str,
        timeout: Option<u32>,
        network: Network,
    ) -> Result<Self, EasySendError> {
        let mut secret = [0u8; SECRET_LENGTH];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::from_secret(secret, passphrase, sender_pub_key, timeout.unwrap_or(DEFAULT_EASY_SEND_TIMEOUT), network)
    }

    pub fn from_secret(
        secret: [u8; SECRET_LENGTH],
        passphrase: &str,
        sender_pub_key: PublicKey,
        timeout: u32,
        network: Network,
    ) -> Result<Self, EasySendError> {
        let params = EasySendParams {
            receiver_pub_key: receiver_key(&secret, passphrase)?.public_key(),
            sender_pub_key,
            timeout,
        };
        // Validates the timeout and key distinctness up front.
        build_easy_send_out([params.receiver_pub_key, params.sender_pub_key], timeout, network)?;
        Ok(Self {
            secret,
            params,
            network,
        })
    }

    pub fn params(&self) -> &EasySendParams {
        &self.params
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn condition(&self) -> Result<SpendCondition, EasySendError> {
        Ok(build_easy_send_out(
            [self.params.receiver_pub_key, self.params.sender_pub_key],
            self.params.timeout,
            self.network,
        )?)
    }

    pub fn address(&self) -> Result<Address, EasySendError> {
        Ok(self.condition()?.address)
    }

    pub fn template(&self) -> ScriptTemplate {
        ScriptTemplate::EasySendP2SH(self.params)
    }

    /// What the receiver needs, minus the passphrase.
    pub fn receipt(&self) -> EasyReceipt {
        EasyReceipt {
            secret: self.secret,
            sender_pub_key: self.params.sender_pub_key,
            timeout: self.params.timeout,
            network: self.network,
        }
    }
}

impl fmt::Debug for EasySend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EasySend")
            .field("params", &self.params)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// The receiver's half: secret, sender key and timeout.
///
/// Its string form is base58check over
/// `network tag | secret | sender pubkey | timeout (u32 LE)`.
#[derive(Clone, PartialEq, Eq)]
pub struct EasyReceipt {
    pub secret: [u8; SECRET_LENGTH],
    pub sender_pub_key: PublicKey,
    pub timeout: u32,
    pub network: Network,
}

impl EasyReceipt {
    /// Rebuild the commitment with the passphrase the sender chose. A
    /// wrong passphrase yields a valid commitment at a different address.
    pub fn open(&self, passphrase: &str) -> Result<EasySend, EasySendError> {
        EasySend::from_secret(self.secret, passphrase, self.sender_pub_key, self.timeout, self.network)
    }

    pub fn receiver_key(&self, passphrase: &str) -> Result<PrivateKey, EasySendError> {
        receiver_key(&self.secret, passphrase)
    }
}

impl fmt::Display for EasyReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(RECEIPT_LENGTH);
        payload.push(match self.network {
            Network::Livenet => RECEIPT_LIVENET,
            Network::Testnet => RECEIPT_TESTNET,
        });
        payload.extend_from_slice(&self.secret);
        payload.extend_from_slice(&self.sender_pub_key.to_bytes());
        payload.extend_from_slice(&self.timeout.to_le_bytes());
        f.write_str(&bs58::encode(payload).with_check().into_string())
    }
}

impl fmt::Debug for EasyReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EasyReceipt")
            .field("sender_pub_key", &self.sender_pub_key)
            .field("timeout", &self.timeout)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl FromStr for EasyReceipt {
    type Err = EasySendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| EasySendError::InvalidReceipt(why.to_string());
        let payload = bs58::decode(s.trim())
            .with_check(None)
            .into_vec()
            .map_err(|_| invalid("checksum mismatch"))?;
        if payload.len() != RECEIPT_LENGTH {
            return Err(invalid("wrong length"));
        }
        let network = match payload[0] {
            RECEIPT_LIVENET => Network::Livenet,
            RECEIPT_TESTNET => Network::Testnet,
            _ => return Err(invalid("unknown network tag")),
        };
        let (secret, rest) = payload[1..].split_at(SECRET_LENGTH);
        let (key, timeout) = rest.split_at(PUBLIC_KEY_LENGTH);
        let secret = <[u8; SECRET_LENGTH]>::try_from(secret).map_err(|_| invalid("secret"))?;
        let timeout = <[u8; 4]>::try_from(timeout).map_err(|_| invalid("timeout"))?;
        Ok(Self {
            secret,
            sender_pub_key: PublicKey::from_slice(key).map_err(|_| invalid("sender key"))?,
            timeout: u32::from_le_bytes(timeout),
            network,
        })
    }
}

impl Serialize for EasyReceipt {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EasyReceipt {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Spending
// ---------------------------------------------------------------------------

/// Which branch a spend takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendPath {
    /// Receiver claims with the key derived from the secret.
    Redeem,
    /// Sender reclaims after the timeout.
    Cancel,
}

/// One output locked to the easy-send address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EasySendCoin {
    pub outpoint: OutPoint,
    pub satoshis: u64,
}

/// Sweep `coins` to `destination` along `path`, signed by `signer`.
///
/// The whole balance minus the fee goes to one output. Cancels use a
/// version 2 transaction with every input's sequence set to the timeout
/// so the `OP_CHECKSEQUENCEVERIFY` branch can pass.
pub fn build_spend(
    params: &EasySendParams,
    network: Network,
    path: SpendPath,
    signer: &PrivateKey,
    coins: &[EasySendCoin],
    destination: &Address,
    rate: FeeRate,
) -> Result<Transaction, EasySendError> {
    let signer_pub = signer.public_key();
    let expected = match path {
        SpendPath::Redeem => params.receiver_pub_key,
        SpendPath::Cancel => params.sender_pub_key,
    };
    if signer_pub != expected {
        return Err(EasySendError::CouldNotBuildTransaction(format!(
            "{:?} path needs a different key",
            path
        )));
    }
    if destination.network != network {
        return Err(AddressError::WrongNetwork {
            expected: network,
            found: destination.network,
        }
        .into());
    }
    if coins.is_empty() {
        return Err(EasySendError::NoFunds);
    }

    let template = ScriptTemplate::EasySendP2SH(*params);
    let redeem = template.redeem_script()?.unwrap_or_default();
    let available: u64 = coins.iter().map(|c| c.satoshis).sum();
    let templates = vec![template; coins.len()];
    let fee = rate.fee_for(estimate_size(&templates, &[*destination])?);
    let amount = available.saturating_sub(fee);
    if amount < DUST_THRESHOLD {
        return Err(EasySendError::InsufficientFunds { available, fee });
    }

    let (version, sequence) = match path {
        SpendPath::Redeem => (1, SEQUENCE_FINAL),
        SpendPath::Cancel => (CSV_TX_VERSION, params.timeout),
    };
    let mut tx = Transaction {
        version,
        inputs: coins
            .iter()
            .map(|c| TxIn {
                sequence,
                ..TxIn::new(c.outpoint)
            })
            .collect(),
        outputs: vec![TxOut {
            value: amount,
            script_pubkey: Script::for_address(destination).into_bytes(),
        }],
        lock_time: 0,
    };

    let mut script_sigs = Vec::with_capacity(coins.len());
    for index in 0..tx.inputs.len() {
        let sighash = tx.signature_hash(index, redeem.as_bytes(), SIGHASH_ALL)?;
        let sig = signer.sign_hash(&sighash);
        script_sigs.push(easy_send_input(&sig, &signer_pub, params)?);
    }
    for (input, script) in tx.inputs.iter_mut().zip(script_sigs) {
        input.script_sig = script.into_bytes();
    }
    debug!(?path, inputs = coins.len(), amount, fee, "easy-send spend built");
    Ok(tx)
}
