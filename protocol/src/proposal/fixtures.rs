//! Shared test wallet: three testnet copayers in a 2-of-3.

use bip39::Mnemonic;

use super::builder::OutputRequest;
use super::types::Utxo;
use crate::address::{Address, Network};
use crate::codec::Hash256;
use crate::credentials::{Credentials, DerivationStrategy, RingEntry};
use crate::crypto::keys::PrivateKey;

pub(crate) const WALLET_ID: &str = "wallet-1";

pub(crate) fn copayer(seed: u8) -> Credentials {
    let phrase = Mnemonic::from_entropy(&[seed; 16]).unwrap().to_string();
    Credentials::from_mnemonic(Network::Testnet, &phrase, "", 0, DerivationStrategy::Bip44).unwrap()
}

pub(crate) fn wallet(m: usize, n: usize) -> Vec<Credentials> {
    let mut all: Vec<Credentials> = (1..=n as u8).map(copayer).collect();
    let ring: Vec<RingEntry> = all.iter().map(|c| c.own_ring_entry().unwrap()).collect();
    let shared = PrivateKey::from_bytes(&[9u8; 32]).unwrap();
    for c in &mut all {
        c.add_wallet_info(WALLET_ID, "treasury", m, n, None).unwrap();
        if n > 1 {
            c.add_public_key_ring(ring.clone()).unwrap();
        }
        c.add_wallet_private_key(&shared);
    }
    all
}

pub(crate) fn utxo(creds: &Credentials, index: u32, satoshis: u64, confirmations: u32) -> Utxo {
    let derived = creds.derive_address(false, index).unwrap();
    Utxo {
        txid: Hash256::digest(&index.to_le_bytes()),
        vout: 0,
        satoshis,
        address: derived.address,
        path: derived.path,
        confirmations,
        locked: false,
    }
}

pub(crate) fn pay(creds: &Credentials, amount: u64) -> OutputRequest {
    let to = Address::from_public_key(creds.network(), &PrivateKey::generate().public_key());
    OutputRequest {
        address: to.to_string(),
        amount,
        message: None,
    }
}
