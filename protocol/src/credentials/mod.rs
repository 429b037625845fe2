//! # Credentials
//!
//! Everything a copayer holds for one wallet: the key tree, the derived
//! request keys, the encrypting keys and the multisig public-key ring.
//!
//! ## Key Tree
//!
//! ```text
//! master (BIP32, from mnemonic or xprv)
//!   ├── m/1'/0                 request-authentication key
//!   ├── m/1'/1                 transaction-request (proposal signing) key
//!   └── <strategy root>        account xpub (shared with copayers)
//!         └── <address path>   per-address signing keys
//! ```
//!
//! ## Private Material
//!
//! The master key may be held in plain, sealed in a [`PasswordEnvelope`],
//! held by an external device, or absent (read-only copy). Signing never
//! mutates the credentials: [`Credentials::unlocked_master`] hands out a
//! decrypted key that the caller drops when the signing call ends.
//!
//! ## Completeness
//!
//! A wallet with `n` copayers is complete once the ring holds exactly `n`
//! distinct xpubs and `m`/`n` are known. Incomplete credentials may derive
//! their own keys but cannot produce multisig addresses or signatures.

pub mod derivation;
pub mod secret;
pub mod selftest;

use std::collections::HashSet;
use std::fmt;

use bip39::Mnemonic;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::address::{Address, Network};
use crate::config::{DEFAULT_KDF_ITERATIONS, REQUEST_KEY_PATH, TX_REQUEST_KEY_PATH};
use crate::crypto::encryption::{EncryptionError, PasswordEnvelope};
use crate::crypto::hash::sha256;
use crate::crypto::hd::{DerivationPath, ExtendedPrivKey, ExtendedPubKey, HdError};
use crate::crypto::keys::{KeyError, PrivateKey, PublicKey};
use crate::script::{ScriptError, ScriptTemplate};

pub use derivation::DerivationStrategy;
pub use secret::WalletSecret;
pub use selftest::device_self_test;

const CREDENTIALS_VERSION: u32 = 2;
const PERSONAL_KEY_TAG: &[u8] = b"personalKey";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("key derivation error: {0}")]
    Hd(#[from] HdError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("invalid wallet secret: {0}")]
    InvalidSecret(String),

    #[error("invalid backup: {0}")]
    InvalidBackup(String),

    #[error("public key ring is incomplete")]
    Incomplete,

    #[error("invalid public key ring: {0}")]
    InvalidRing(String),

    #[error("private key is encrypted")]
    PrivateKeyEncrypted,

    #[error("private key is not encrypted")]
    PrivateKeyNotEncrypted,

    #[error("no private key available")]
    NoPrivateKey,

    #[error("private key is held by external source {0}")]
    ExternalKey(String),

    #[error("device key derivation self-test failed; signing disabled")]
    SelfTestFailed,
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// One copayer as seen by everyone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingEntry {
    pub xpub_key: ExtendedPubKey,
    pub request_pub_key: PublicKey,
    /// Verifies proposals this copayer creates.
    pub tx_request_pub_key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copayer_name: Option<String>,
}

impl RingEntry {
    pub fn copayer_id(&self) -> String {
        copayer_id(&self.xpub_key)
    }
}

/// `hex(sha256(xpub))`.
pub fn copayer_id(xpub: &ExtendedPubKey) -> String {
    hex::encode(sha256(xpub.to_string().as_bytes()))
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum PrivateMaterial {
    #[serde(rename_all = "camelCase")]
    Plain {
        xpriv: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mnemonic: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Encrypted { envelope: PasswordEnvelope },
    #[serde(rename_all = "camelCase")]
    External { source: String },
    None,
}

/// What the password envelope seals.
#[derive(Serialize, Deserialize)]
struct SealedSecrets {
    xpriv: String,
    #[serde(default)]
    mnemonic: Option<String>,
}

/// An address derived from the wallet's key ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: Address,
    /// Path relative to the account root.
    pub path: DerivationPath,
    /// Keys in script order.
    pub public_keys: Vec<PublicKey>,
    pub template: ScriptTemplate,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    version: u32,
    network: Network,
    derivation_strategy: DerivationStrategy,
    account: u32,
    xpub_key: ExtendedPubKey,
    copayer_id: String,
    request_priv_key: String,
    tx_request_priv_key: String,
    personal_encrypting_key: String,
    private: PrivateMaterial,
    #[serde(default)]
    copayer_name: Option<String>,
    #[serde(default)]
    wallet_id: Option<String>,
    #[serde(default)]
    wallet_name: Option<String>,
    #[serde(default)]
    m: Option<usize>,
    #[serde(default)]
    n: Option<usize>,
    #[serde(default)]
    wallet_priv_key: Option<String>,
    #[serde(default)]
    shared_encrypting_key: Option<String>,
    #[serde(default)]
    public_key_ring: Vec<RingEntry>,
}

impl Credentials {
    // -- construction -------------------------------------------------------

    /// Fresh credentials backed by a new 12-word mnemonic.
    pub fn create(
        network: Network,
        account: u32,
        strategy: DerivationStrategy,
    ) -> Result<Self, CredentialsError> {
        let mut entropy = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| CredentialsError::InvalidMnemonic(e.to_string()))?;
        Self::from_mnemonic(network, &mnemonic.to_string(), "", account, strategy)
    }

    pub fn from_mnemonic(
        network: Network,
        phrase: &str,
        passphrase: &str,
        account: u32,
        strategy: DerivationStrategy,
    ) -> Result<Self, CredentialsError> {
        let mnemonic = Mnemonic::parse_normalized(phrase.trim())
            .map_err(|e| CredentialsError::InvalidMnemonic(e.to_string()))?;
        let seed = mnemonic.to_seed_normalized(passphrase);
        let master = ExtendedPrivKey::from_seed(network, &seed)?;
        let mut creds = Self::from_master(&master, account, strategy)?;
        if let PrivateMaterial::Plain { mnemonic: slot, .. } = &mut creds.private {
            *slot = Some(mnemonic.to_string());
        }
        Ok(creds)
    }

    pub fn from_extended_private_key(
        xpriv: &str,
        account: u32,
        strategy: DerivationStrategy,
    ) -> Result<Self, CredentialsError> {
        let master: ExtendedPrivKey = xpriv.parse()?;
        Self::from_master(&master, account, strategy)
    }

    /// Read-only or hardware-backed credentials from an account xpub.
    ///
    /// Request keys cannot come from the master key here, so they are
    /// derived from `entropy_source` (typically a signature or hash the
    /// external device produced once).
    pub fn from_extended_public_key(
        xpub: ExtendedPubKey,
        entropy_source: &[u8],
        account: u32,
        strategy: DerivationStrategy,
        external_source: Option<String>,
    ) -> Result<Self, CredentialsError> {
        let seed = sha256(entropy_source);
        let request_root = ExtendedPrivKey::from_seed(xpub.network, &seed)?;
        let private = match external_source {
            Some(source) => PrivateMaterial::External { source },
            None => PrivateMaterial::None,
        };
        Self::assemble(xpub, &request_root, account, strategy, private)
    }

    fn from_master(
        master: &ExtendedPrivKey,
        account: u32,
        strategy: DerivationStrategy,
    ) -> Result<Self, CredentialsError> {
        let root = strategy.root_path(master.network, account)?;
        let xpub = master.derive_path(&root)?.to_extended_public();
        let private = PrivateMaterial::Plain {
            xpriv: master.to_string(),
            mnemonic: None,
        };
        Self::assemble(xpub, master, account, strategy, private)
    }

    fn assemble(
        xpub: ExtendedPubKey,
        request_root: &ExtendedPrivKey,
        account: u32,
        strategy: DerivationStrategy,
        private: PrivateMaterial,
    ) -> Result<Self, CredentialsError> {
        let request = request_root.derive(REQUEST_KEY_PATH)?;
        let tx_request = request_root.derive(TX_REQUEST_KEY_PATH)?;

        let mut personal_preimage = PERSONAL_KEY_TAG.to_vec();
        personal_preimage.extend_from_slice(&request.private_key().to_bytes());
        let personal = sha256(&personal_preimage);

        let copayer_id = copayer_id(&xpub);
        debug!(copayer_id = %copayer_id, strategy = %strategy, "credentials assembled");
        Ok(Self {
            version: CREDENTIALS_VERSION,
            network: xpub.network,
            derivation_strategy: strategy,
            account,
            xpub_key: xpub,
            copayer_id,
            request_priv_key: request.private_key().to_hex(),
            tx_request_priv_key: tx_request.private_key().to_hex(),
            personal_encrypting_key: hex::encode(personal),
            private,
            copayer_name: None,
            wallet_id: None,
            wallet_name: None,
            m: None,
            n: None,
            wallet_priv_key: None,
            shared_encrypting_key: None,
            public_key_ring: Vec::new(),
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn derivation_strategy(&self) -> DerivationStrategy {
        self.derivation_strategy
    }

    pub fn account(&self) -> u32 {
        self.account
    }

    pub fn xpub_key(&self) -> &ExtendedPubKey {
        &self.xpub_key
    }

    pub fn copayer_id(&self) -> &str {
        &self.copayer_id
    }

    pub fn copayer_name(&self) -> Option<&str> {
        self.copayer_name.as_deref()
    }

    pub fn wallet_id(&self) -> Option<&str> {
        self.wallet_id.as_deref()
    }

    pub fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }

    pub fn m(&self) -> Option<usize> {
        self.m
    }

    pub fn n(&self) -> Option<usize> {
        self.n
    }

    pub fn public_key_ring(&self) -> &[RingEntry] {
        &self.public_key_ring
    }

    pub fn ring_entry(&self, copayer_id: &str) -> Option<&RingEntry> {
        self.public_key_ring.iter().find(|e| e.copayer_id() == copayer_id)
    }

    pub fn request_private_key(&self) -> Result<PrivateKey, CredentialsError> {
        Ok(PrivateKey::from_hex(&self.request_priv_key)?)
    }

    pub fn request_public_key(&self) -> Result<PublicKey, CredentialsError> {
        Ok(self.request_private_key()?.public_key())
    }

    pub fn tx_request_private_key(&self) -> Result<PrivateKey, CredentialsError> {
        Ok(PrivateKey::from_hex(&self.tx_request_priv_key)?)
    }

    pub fn personal_encrypting_key(&self) -> Result<[u8; 32], CredentialsError> {
        decode_key32(&self.personal_encrypting_key)
    }

    pub fn shared_encrypting_key(&self) -> Result<Option<[u8; 32]>, CredentialsError> {
        self.shared_encrypting_key.as_deref().map(decode_key32).transpose()
    }

    /// This copayer's ring entry.
    pub fn own_ring_entry(&self) -> Result<RingEntry, CredentialsError> {
        Ok(RingEntry {
            xpub_key: self.xpub_key.clone(),
            request_pub_key: self.request_public_key()?,
            tx_request_pub_key: self.tx_request_private_key()?.public_key(),
            copayer_name: self.copayer_name.clone(),
        })
    }

    // -- wallet membership --------------------------------------------------

    pub fn add_wallet_info(
        &mut self,
        wallet_id: &str,
        wallet_name: &str,
        m: usize,
        n: usize,
        copayer_name: Option<String>,
    ) -> Result<(), CredentialsError> {
        if m == 0 || m > n {
            return Err(ScriptError::InvalidThreshold { m, n }.into());
        }
        self.wallet_id = Some(wallet_id.to_string());
        self.wallet_name = Some(wallet_name.to_string());
        self.m = Some(m);
        self.n = Some(n);
        if copayer_name.is_some() {
            self.copayer_name = copayer_name;
        }
        if n == 1 {
            self.public_key_ring = vec![self.own_ring_entry()?];
        }
        Ok(())
    }

    /// Store the wallet key from a join secret and derive the shared
    /// encrypting key from it.
    pub fn add_wallet_private_key(&mut self, key: &PrivateKey) {
        self.wallet_priv_key = Some(key.to_hex());
        self.shared_encrypting_key = Some(hex::encode(sha256(&key.to_bytes())));
    }

    /// Wallet key as a join secret, once wallet info is known.
    pub fn wallet_secret(&self) -> Result<Option<WalletSecret>, CredentialsError> {
        let (Some(id), Some(key)) = (&self.wallet_id, &self.wallet_priv_key) else {
            return Ok(None);
        };
        let wallet_id = uuid::Uuid::parse_str(id)
            .map_err(|e| CredentialsError::InvalidSecret(e.to_string()))?;
        Ok(Some(WalletSecret::new(wallet_id, PrivateKey::from_hex(key)?, self.network)))
    }

    /// Install the full ring. Must contain `n` distinct copayers, this one
    /// included.
    pub fn add_public_key_ring(&mut self, ring: Vec<RingEntry>) -> Result<(), CredentialsError> {
        let ids: HashSet<String> = ring.iter().map(RingEntry::copayer_id).collect();
        if ids.len() != ring.len() {
            return Err(CredentialsError::InvalidRing("duplicate copayer".into()));
        }
        if let Some(n) = self.n {
            if ring.len() != n {
                return Err(CredentialsError::InvalidRing(format!(
                    "expected {} copayers, got {}",
                    n,
                    ring.len()
                )));
            }
        }
        if !ids.contains(&self.copayer_id) {
            return Err(CredentialsError::InvalidRing("ring does not include this copayer".into()));
        }
        if ring.iter().any(|e| e.xpub_key.network != self.network) {
            return Err(CredentialsError::InvalidRing("network mismatch".into()));
        }
        self.public_key_ring = ring;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        let (Some(m), Some(n)) = (self.m, self.n) else {
            return false;
        };
        if m == 0 || m > n || self.public_key_ring.len() != n {
            return false;
        }
        let distinct: HashSet<String> = self.public_key_ring.iter().map(|e| e.xpub_key.to_string()).collect();
        distinct.len() == n
    }

    // -- private key state --------------------------------------------------

    pub fn has_private_key(&self) -> bool {
        matches!(
            self.private,
            PrivateMaterial::Plain { .. } | PrivateMaterial::Encrypted { .. } | PrivateMaterial::External { .. }
        )
    }

    pub fn is_private_key_encrypted(&self) -> bool {
        matches!(self.private, PrivateMaterial::Encrypted { .. })
    }

    pub fn is_private_key_external(&self) -> bool {
        matches!(self.private, PrivateMaterial::External { .. })
    }

    /// A key is present, usable without a password, and the device passed
    /// its derivation self-test.
    pub fn can_sign(&self) -> bool {
        let key_ready = matches!(
            self.private,
            PrivateMaterial::Plain { .. } | PrivateMaterial::External { .. }
        );
        key_ready && device_self_test()
    }

    pub fn encrypt_private_key(&mut self, password: &str) -> Result<(), CredentialsError> {
        self.encrypt_private_key_with_iterations(password, DEFAULT_KDF_ITERATIONS)
    }

    pub fn encrypt_private_key_with_iterations(
        &mut self,
        password: &str,
        iterations: u32,
    ) -> Result<(), CredentialsError> {
        let PrivateMaterial::Plain { xpriv, mnemonic } = &self.private else {
            return Err(match self.private {
                PrivateMaterial::Encrypted { .. } => CredentialsError::PrivateKeyEncrypted,
                _ => CredentialsError::NoPrivateKey,
            });
        };
        let sealed = SealedSecrets {
            xpriv: xpriv.clone(),
            mnemonic: mnemonic.clone(),
        };
        let payload = serde_json::to_vec(&sealed)
            .map_err(|e| CredentialsError::InvalidBackup(e.to_string()))?;
        let envelope = PasswordEnvelope::seal_with_iterations(password, &payload, iterations)?;
        self.private = PrivateMaterial::Encrypted { envelope };
        Ok(())
    }

    /// Permanently remove the password protection.
    pub fn decrypt_private_key(&mut self, password: &str) -> Result<(), CredentialsError> {
        let sealed = self.open_envelope(password)?;
        self.private = PrivateMaterial::Plain {
            xpriv: sealed.xpriv,
            mnemonic: sealed.mnemonic,
        };
        Ok(())
    }

    fn open_envelope(&self, password: &str) -> Result<SealedSecrets, CredentialsError> {
        let PrivateMaterial::Encrypted { envelope } = &self.private else {
            return Err(CredentialsError::PrivateKeyNotEncrypted);
        };
        let plain = envelope.open(password)?;
        serde_json::from_slice(&plain).map_err(|_| EncryptionError::CorruptData.into())
    }

    /// The mnemonic, if it was kept. Needs the password when encrypted.
    pub fn mnemonic(&self, password: Option<&str>) -> Result<Option<String>, CredentialsError> {
        match &self.private {
            PrivateMaterial::Plain { mnemonic, .. } => Ok(mnemonic.clone()),
            PrivateMaterial::Encrypted { .. } => {
                let password = password.ok_or(CredentialsError::PrivateKeyEncrypted)?;
                Ok(self.open_envelope(password)?.mnemonic)
            }
            _ => Ok(None),
        }
    }

    /// Drop the kept mnemonic, leaving only the xprv.
    pub fn clear_mnemonic(&mut self) -> Result<(), CredentialsError> {
        match &mut self.private {
            PrivateMaterial::Plain { mnemonic, .. } => {
                *mnemonic = None;
                Ok(())
            }
            PrivateMaterial::Encrypted { .. } => Err(CredentialsError::PrivateKeyEncrypted),
            _ => Ok(()),
        }
    }

    /// The master private key for the duration of one signing call.
    ///
    /// Refuses to run if the device self-test failed.
    pub fn unlocked_master(&self, password: Option<&str>) -> Result<ExtendedPrivKey, CredentialsError> {
        if !device_self_test() {
            return Err(CredentialsError::SelfTestFailed);
        }
        let xpriv = match &self.private {
            PrivateMaterial::Plain { xpriv, .. } => xpriv.clone(),
            PrivateMaterial::Encrypted { .. } => {
                let password = password.ok_or(CredentialsError::PrivateKeyEncrypted)?;
                self.open_envelope(password)?.xpriv
            }
            PrivateMaterial::External { source } => {
                return Err(CredentialsError::ExternalKey(source.clone()))
            }
            PrivateMaterial::None => return Err(CredentialsError::NoPrivateKey),
        };
        Ok(xpriv.parse()?)
    }

    /// Signing key for an address path (relative to the account root).
    pub fn signing_key(
        &self,
        master: &ExtendedPrivKey,
        path: &DerivationPath,
    ) -> Result<PrivateKey, CredentialsError> {
        let root = self.derivation_strategy.root_path(self.network, self.account)?;
        let derived = master.derive_path(&root.extend(path))?;
        Ok(derived.private_key().clone())
    }

    // -- addresses ----------------------------------------------------------

    pub fn derive_address(&self, change: bool, index: u32) -> Result<DerivedAddress, CredentialsError> {
        self.derive_address_at(&self.derivation_strategy.address_path(change, index))
    }

    /// Address at `path`. Single-copayer wallets get P2PKH; shared wallets
    /// get m-of-n P2SH over the ring, keys sorted by their byte encoding.
    pub fn derive_address_at(&self, path: &DerivationPath) -> Result<DerivedAddress, CredentialsError> {
        let n = self.n.unwrap_or(1);
        let template = if n == 1 {
            ScriptTemplate::PubKeyHash {
                public_key: self.xpub_key.derive_path(path)?.public_key(),
            }
        } else {
            if !self.is_complete() {
                return Err(CredentialsError::Incomplete);
            }
            let mut public_keys = self
                .public_key_ring
                .iter()
                .map(|e| e.xpub_key.derive_path(path).map(|k| k.public_key()))
                .collect::<Result<Vec<_>, _>>()?;
            public_keys.sort();
            ScriptTemplate::MultisigP2SH {
                m: self.m.ok_or(CredentialsError::Incomplete)?,
                public_keys,
            }
        };
        let public_keys = match &template {
            ScriptTemplate::PubKeyHash { public_key } => vec![*public_key],
            ScriptTemplate::MultisigP2SH { public_keys, .. } => public_keys.clone(),
            _ => Vec::new(),
        };
        Ok(DerivedAddress {
            address: template.address(self.network)?,
            path: path.clone(),
            public_keys,
            template,
        })
    }

    // -- export / import ----------------------------------------------------

    /// Serialize to JSON, optionally wrapped in a password envelope.
    /// `include_private: false` produces a read-only copy.
    pub fn export(&self, password: Option<&str>, include_private: bool) -> Result<String, CredentialsError> {
        let mut copy = self.clone();
        if !include_private {
            copy.private = PrivateMaterial::None;
        }
        let json = serde_json::to_string(&copy)
            .map_err(|e| CredentialsError::InvalidBackup(e.to_string()))?;
        match password {
            None => Ok(json),
            Some(pw) => {
                let envelope = PasswordEnvelope::seal(pw, json.as_bytes())?;
                serde_json::to_string(&envelope).map_err(|e| CredentialsError::InvalidBackup(e.to_string()))
            }
        }
    }

    pub fn import(data: &str, password: Option<&str>) -> Result<Self, CredentialsError> {
        let json = match serde_json::from_str::<PasswordEnvelope>(data) {
            Ok(envelope) => {
                let pw = password.ok_or_else(|| {
                    CredentialsError::InvalidBackup("backup is password protected".into())
                })?;
                let plain = envelope.open(pw)?;
                String::from_utf8(plain).map_err(|_| EncryptionError::CorruptData)?
            }
            Err(_) => data.to_string(),
        };
        let creds: Credentials =
            serde_json::from_str(&json).map_err(|e| CredentialsError::InvalidBackup(e.to_string()))?;
        creds.check_consistency()?;
        Ok(creds)
    }

    fn check_consistency(&self) -> Result<(), CredentialsError> {
        let bad = |why: &str| CredentialsError::InvalidBackup(why.to_string());
        if self.copayer_id != copayer_id(&self.xpub_key) {
            return Err(bad("copayer id does not match xpub"));
        }
        if self.network != self.xpub_key.network {
            return Err(bad("network does not match xpub"));
        }
        PrivateKey::from_hex(&self.request_priv_key).map_err(|_| bad("request key"))?;
        PrivateKey::from_hex(&self.tx_request_priv_key).map_err(|_| bad("tx request key"))?;
        decode_key32(&self.personal_encrypting_key).map_err(|_| bad("personal encrypting key"))?;
        if let PrivateMaterial::Plain { xpriv, .. } = &self.private {
            let master: ExtendedPrivKey = xpriv.parse().map_err(|_| bad("xpriv"))?;
            let root = self
                .derivation_strategy
                .root_path(self.network, self.account)
                .map_err(|_| bad("account"))?;
            let derived = master.derive_path(&root).map_err(|_| bad("xpriv"))?;
            if derived.to_extended_public() != self.xpub_key {
                return Err(bad("xpriv does not match xpub"));
            }
        }
        Ok(())
    }
}

fn decode_key32(s: &str) -> Result<[u8; 32], CredentialsError> {
    let bytes = hex::decode(s).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| KeyError::InvalidHex("expected 32 bytes".into()).into())
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("network", &self.network)
            .field("copayer_id", &self.copayer_id)
            .field("wallet_id", &self.wallet_id)
            .field("m", &self.m)
            .field("n", &self.n)
            .field("encrypted", &self.is_private_key_encrypted())
            .finish_non_exhaustive()
    }
}
