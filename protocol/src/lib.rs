// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Merit Wallet Core Library
//!
//! The engine behind a multi-signature wallet for a referral-gated
//! UTXO network. It builds and signs transactions, but it never decides
//! alone: spends are negotiated as proposals between copayers through a
//! coordinating service, and every proposal the service hands back is
//! rebuilt and checked locally before a key touches it.
//!
//! ## Architecture
//!
//! - **codec**: Canonical binary encoding: transactions, blocks, referrals.
//! - **crypto**: Hashing, secp256k1 keys, BIP32 derivation, message encryption.
//! - **address**: Networks and base58check addresses.
//! - **credentials**: A copayer's keys, wallet membership and backups.
//! - **script**: Multisig, vault and easy-send scripts and their spends.
//! - **easysend**: Secret-based payments the sender can reclaim after a timeout.
//! - **vault**: Spend-limited, whitelisted balances with a master-key escape.
//! - **proposal**: The transaction proposal lifecycle.
//! - **sync**: Authenticated client for the coordinating service.
//! - **collab**: Traits for the settings, contacts, push and rate collaborators.
//! - **config**: Protocol constants and client configuration.
//! - **error**: The crate-wide error taxonomy.
//!
//! ## Ground Rules
//!
//! 1. Nothing the service returns is trusted until it was rebuilt locally.
//! 2. Key material never reaches a log line.
//! 3. Retrying is the caller's decision; the library never loops on failure.

pub mod address;
pub mod codec;
pub mod collab;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod easysend;
pub mod error;
pub mod proposal;
pub mod script;
pub mod sync;
pub mod vault;

pub use error::WalletError;
