//! Device-binding self-test.
//!
//! Before any private key is used, the derivation stack is checked against
//! fixed published vectors: a BIP39 mnemonic-to-seed conversion and a
//! BIP32 hardened child. If either mismatches, the platform's crypto is
//! not trustworthy and every signing entry point refuses to run.
//!
//! The result is computed once per process and cached.

use std::sync::OnceLock;

use bip39::Mnemonic;
use tracing::{error, info};

use crate::address::Network;
use crate::crypto::hd::ExtendedPrivKey;

const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const TEST_PASSPHRASE: &str = "TREZOR";
const TEST_SEED_HEX: &str = "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04";

const BIP32_SEED_HEX: &str = "000102030405060708090a0b0c0d0e0f";
const BIP32_CHILD_PATH: &str = "m/0'";
const BIP32_CHILD_XPRV: &str = "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7";

static RESULT: OnceLock<bool> = OnceLock::new();

/// Whether this device derives keys correctly. Runs the vectors on the
/// first call.
pub fn device_self_test() -> bool {
    *RESULT.get_or_init(|| {
        let ok = run_vectors();
        if ok {
            info!("key derivation self-test passed");
        } else {
            error!("key derivation self-test FAILED; signing disabled");
        }
        ok
    })
}

fn run_vectors() -> bool {
    check_mnemonic_vector().unwrap_or(false) && check_bip32_vector().unwrap_or(false)
}

fn check_mnemonic_vector() -> Option<bool> {
    let mnemonic = Mnemonic::parse_normalized(TEST_MNEMONIC).ok()?;
    let seed = mnemonic.to_seed_normalized(TEST_PASSPHRASE);
    Some(hex::encode(seed) == TEST_SEED_HEX)
}

fn check_bip32_vector() -> Option<bool> {
    let seed = hex::decode(BIP32_SEED_HEX).ok()?;
    let master = ExtendedPrivKey::from_seed(Network::Livenet, &seed).ok()?;
    let child = master.derive(BIP32_CHILD_PATH).ok()?;
    Some(child.to_string() == BIP32_CHILD_XPRV)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_pass_on_this_platform() {
        assert_eq!(check_mnemonic_vector(), Some(true));
        assert_eq!(check_bip32_vector(), Some(true));
        assert!(device_self_test());
    }

    #[test]
    fn result_is_cached() {
        let first = device_self_test();
        assert_eq!(device_self_test(), first);
        assert!(RESULT.get().is_some());
    }
}
