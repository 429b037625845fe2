//! Derivation strategies and key paths.
//!
//! | Strategy        | Account root          | Address path (relative)   |
//! |-----------------|-----------------------|---------------------------|
//! | legacy multisig | `m/45'`               | `m/2147483647/c/i`        |
//! | BIP44           | `m/44'/coin'/acct'`   | `m/c/i`                   |
//!
//! `c` is 0 for receive and 1 for change addresses. Address paths are
//! always non-hardened so any copayer can derive them from an xpub.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Network;
use crate::config::{BIP44_PURPOSE, BIP45_PURPOSE_PATH, BIP45_SHARED_INDEX, HARDENED_OFFSET};
use crate::crypto::hd::{DerivationPath, HdError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DerivationStrategy {
    /// Shared-cosigner-index multisig derivation.
    #[serde(rename = "BIP45")]
    LegacyMultisig,
    #[default]
    #[serde(rename = "BIP44")]
    Bip44,
}

impl DerivationStrategy {
    /// Path from the master key to the account xpub.
    pub fn root_path(&self, network: Network, account: u32) -> Result<DerivationPath, HdError> {
        match self {
            DerivationStrategy::LegacyMultisig => BIP45_PURPOSE_PATH.parse(),
            DerivationStrategy::Bip44 => {
                if account >= HARDENED_OFFSET {
                    return Err(HdError::InvalidPath(format!("account {}", account)));
                }
                Ok(DerivationPath::default()
                    .child(BIP44_PURPOSE + HARDENED_OFFSET)
                    .child(network.coin_type() + HARDENED_OFFSET)
                    .child(account + HARDENED_OFFSET))
            }
        }
    }

    /// Path from the account xpub to a receive or change address.
    pub fn address_path(&self, change: bool, index: u32) -> DerivationPath {
        let base = match self {
            DerivationStrategy::LegacyMultisig => DerivationPath::default().child(BIP45_SHARED_INDEX),
            DerivationStrategy::Bip44 => DerivationPath::default(),
        };
        base.child(change as u32).child(index)
    }

    /// Whether `path` is a well-formed address path for this strategy.
    pub fn is_address_path(&self, path: &DerivationPath) -> bool {
        let idx = path.indexes();
        let tail = match self {
            DerivationStrategy::LegacyMultisig => {
                if idx.len() != 3 || idx[0] != BIP45_SHARED_INDEX {
                    return false;
                }
                &idx[1..]
            }
            DerivationStrategy::Bip44 => {
                if idx.len() != 2 {
                    return false;
                }
                idx
            }
        };
        tail[0] <= 1 && tail[1] < HARDENED_OFFSET
    }
}

impl fmt::Display for DerivationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DerivationStrategy::LegacyMultisig => "BIP45",
            DerivationStrategy::Bip44 => "BIP44",
        })
    }
}
