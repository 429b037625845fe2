//! # Engine Configuration & Constants
//!
//! Every magic number the wallet engine depends on lives here: address
//! version bytes, HD derivation paths, fee-cache lifetimes, the amount
//! ceiling, and the timing knobs of the sync layer.
//!
//! Two flavours of configuration exist:
//!
//! - **Constants** (`pub const`) are part of the protocol. Changing them
//!   changes derived addresses or wire bytes, so they are not user-tunable.
//! - **[`ClientConfig`]** holds the runtime knobs of a single wallet client
//!   (endpoint, timeouts, polling cadence). It is serde-friendly and can be
//!   loaded from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Network;

// ---------------------------------------------------------------------------
// Address Version Bytes
// ---------------------------------------------------------------------------

/// Livenet pay-to-pubkey-hash version byte. Addresses start with `M`.
pub const LIVENET_PUBKEY_HASH: u8 = 50;

/// Livenet pay-to-script-hash version byte (multisig, easy-send).
pub const LIVENET_SCRIPT_HASH: u8 = 63;

/// Livenet parameterized-script-hash version byte (vaults).
pub const LIVENET_PARAM_SCRIPT_HASH: u8 = 28;

/// Testnet pay-to-pubkey-hash version byte.
pub const TESTNET_PUBKEY_HASH: u8 = 110;

/// Testnet pay-to-script-hash version byte.
pub const TESTNET_SCRIPT_HASH: u8 = 125;

/// Testnet parameterized-script-hash version byte.
pub const TESTNET_PARAM_SCRIPT_HASH: u8 = 117;

// ---------------------------------------------------------------------------
// Extended Key Versions
// ---------------------------------------------------------------------------

/// Livenet extended private key version (`xprv`).
pub const LIVENET_XPRV_VERSION: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];

/// Livenet extended public key version (`xpub`).
pub const LIVENET_XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];

/// Testnet extended private key version (`tprv`).
pub const TESTNET_XPRV_VERSION: [u8; 4] = [0x04, 0x35, 0x83, 0x94];

/// Testnet extended public key version (`tpub`).
pub const TESTNET_XPUB_VERSION: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];

/// Serialized extended key length before the base58check suffix.
pub const EXTENDED_KEY_LENGTH: usize = 78;

// ---------------------------------------------------------------------------
// HD Derivation Paths
// ---------------------------------------------------------------------------

/// Request-authentication key path, relative to the master key.
pub const REQUEST_KEY_PATH: &str = "m/1'/0";

/// Transaction-request (proposal signing) key path.
pub const TX_REQUEST_KEY_PATH: &str = "m/1'/1";

/// Root of the legacy multisig (BIP45) derivation strategy.
pub const BIP45_PURPOSE_PATH: &str = "m/45'";

/// Purpose index of the BIP44 derivation strategy.
pub const BIP44_PURPOSE: u32 = 44;

/// Shared cosigner index used by legacy multisig wallets (BIP45).
pub const BIP45_SHARED_INDEX: u32 = 2_147_483_647;

/// BIP44 coin type for livenet.
pub const LIVENET_COIN_TYPE: u32 = 0;

/// BIP44 coin type for testnet.
pub const TESTNET_COIN_TYPE: u32 = 1;

/// First hardened child index.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Default PBKDF2 iteration count for the password envelope.
pub const DEFAULT_KDF_ITERATIONS: u32 = 10_000;

/// Lower bound accepted when reading an envelope. Anything below this was
/// not produced by us.
pub const MIN_KDF_ITERATIONS: u32 = 1_000;

/// Salt length of the password envelope.
pub const KDF_SALT_LENGTH: usize = 16;

/// Compressed secp256k1 public key length.
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Hash output length in bytes (SHA-256, SHA-256d).
pub const HASH_LENGTH: usize = 32;

/// RIPEMD160(SHA256(x)) output length.
pub const HASH160_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Amounts & Fees
// ---------------------------------------------------------------------------

/// Quanta in one whole coin.
pub const SATOSHIS_PER_COIN: u64 = 100_000_000;

/// Largest amount (in quanta) the engine accepts anywhere. Matches the
/// 2^53 - 1 integer ceiling the wallet's wire peers can represent exactly.
pub const MAX_AMOUNT: u64 = 9_007_199_254_740_991;

/// Outputs below this value are dust. Change smaller than this is folded
/// into the fee instead of creating an unspendable output.
pub const DUST_THRESHOLD: u64 = 546;

/// Named fee levels are cached this long before being refetched.
pub const FEE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Upper bound on fee-per-KB. A server quoting more than this is either
/// broken or hostile.
pub const MAX_FEE_PER_KB: u64 = 10_000_000;

/// Default relative timeout (in blocks) for easy-send scripts.
pub const DEFAULT_EASY_SEND_TIMEOUT: u32 = 1008;

// ---------------------------------------------------------------------------
// Sync Timing
// ---------------------------------------------------------------------------

/// Per-request network timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification polling cadence.
pub const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// First-poll look-back window when no notification id is known yet.
pub const NOTIFICATION_WINDOW: Duration = Duration::from_secs(60);

/// How many notification ids the poller remembers for de-duplication.
pub const NOTIFICATION_DEDUP_CAPACITY: usize = 1024;

/// Caller-side retry defaults for transient failures.
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;

/// Fixed backoff between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Client version string sent with every request.
pub const CLIENT_VERSION: &str = concat!("merit-wallet-core-", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Errors produced while loading or validating a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration of a wallet client.
///
/// Durations are expressed in whole seconds on disk so that the TOML stays
/// readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the coordinating service, e.g. `https://mws.example/bws/api`.
    pub base_url: String,
    pub network: Network,
    pub request_timeout_secs: u64,
    pub fee_cache_ttl_secs: u64,
    pub notification_poll_interval_secs: u64,
    pub notification_window_secs: u64,
    /// Re-emit notifications caused by this copayer's own actions.
    pub include_own_notifications: bool,
    pub retry_attempts: usize,
    pub retry_delay_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3232/bws/api".to_string(),
            network: Network::Livenet,
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
            fee_cache_ttl_secs: FEE_CACHE_TTL.as_secs(),
            notification_poll_interval_secs: NOTIFICATION_POLL_INTERVAL.as_secs(),
            notification_window_secs: NOTIFICATION_WINDOW.as_secs(),
            include_own_notifications: false,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
        }
    }
}

impl ClientConfig {
    /// Parse a TOML document. Missing keys fall back to the defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the client misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request timeout must be non-zero".into()));
        }
        if self.notification_poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll interval must be non-zero".into()));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retry_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fee_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.fee_cache_ttl_secs)
    }

    pub fn notification_poll_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_interval_secs)
    }

    pub fn notification_window(&self) -> Duration {
        Duration::from_secs(self.notification_window_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_bytes_are_distinct() {
        let all = [
            LIVENET_PUBKEY_HASH,
            LIVENET_SCRIPT_HASH,
            LIVENET_PARAM_SCRIPT_HASH,
            TESTNET_PUBKEY_HASH,
            TESTNET_SCRIPT_HASH,
            TESTNET_PARAM_SCRIPT_HASH,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_amount_ceiling_is_safe_integer() {
        assert_eq!(MAX_AMOUNT, (1u64 << 53) - 1);
        assert!(DUST_THRESHOLD < MAX_AMOUNT);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_from_partial_toml() {
        let cfg = ClientConfig::from_toml_str(
            r#"
            base_url = "https://wallet.example/bws/api"
            network = "testnet"
            retry_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.base_url, "https://wallet.example/bws/api");
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.retry_attempts, 5);
        assert_eq!(cfg.fee_cache_ttl(), FEE_CACHE_TTL);
    }

    #[test]
    fn test_config_rejects_bad_url() {
        let err = ClientConfig::from_toml_str(r#"base_url = "ftp://nope""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_config_rejects_zero_retries() {
        let cfg = ClientConfig {
            retry_attempts: 0,
            ..ClientConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
