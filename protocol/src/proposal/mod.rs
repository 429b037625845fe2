//! # Transaction Proposals
//!
//! A proposal (txp) is an intent to pay that several copayers negotiate
//! through the coordinating service until it carries enough signatures to
//! broadcast.
//!
//! ```text
//!  Draft ──publish──▶ Pending ──m accepts──▶ Accepted ──assemble──▶ Broadcast
//!                        │
//!                        └──(service decides)──▶ Rejected / Removed
//! ```
//!
//! Every state is its own type ([`Draft`], [`Pending`], [`Accepted`],
//! [`Rejected`], [`Broadcast`], [`Removed`]); transitions consume the old
//! state. The service's loosely typed records come in through
//! [`ProposalRecord`] and are converted with `TryFrom`.
//!
//! ## Integrity
//!
//! Before a copayer signs, the proposal is rebuilt locally from its body
//! and compared byte-for-byte with the transaction the service returned.
//! The creator's proposal signature and every input address are checked
//! too. Any mismatch is [`ProposalError::ServerCompromised`].
//!
//! ## Submodules
//!
//! - [`types`]: outputs, inputs, fee policy, actions, the proposal body.
//! - [`fee`]: size estimation and the fee-level cache.
//! - [`builder`]: draft creation with validation, input selection and change.
//! - [`verify`]: anti-tamper checks and signature verification.
//! - [`state`]: the typed lifecycle.
//! - [`record`]: the wire record.

pub mod builder;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod fee;
pub mod record;
pub mod state;
pub mod types;
pub mod verify;

use thiserror::Error;

use crate::address::AddressError;
use crate::codec::CodecError;
use crate::credentials::CredentialsError;
use crate::crypto::encryption::EncryptionError;
use crate::script::ScriptError;

pub use builder::{create_draft, OutputRequest, ProposalRequest};
pub use fee::{estimate_size, fee_for_size, FeeCache, FeeRate};
pub use record::{ProposalRecord, ProposalStatus};
pub use state::{Accepted, Broadcast, Draft, Pending, PendingOutcome, Proposal, Rejected, Removed};
pub use types::{
    Action, ActionKind, ChangeOutput, FeeLevel, FeeLevelQuote, FeePolicy, ProposalBody, ProposalOutput,
    SpendSource, Utxo,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProposalError {
    #[error("proposal has no outputs")]
    NoOutputs,

    #[error("amount {0} exceeds the maximum amount")]
    AmountTooLarge(u64),

    #[error("output amount {0} is below the dust threshold")]
    DustOutput(u64),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("fee unavailable: {0}")]
    FeeUnavailable(String),

    #[error("fee rate {0} per kB is above the allowed maximum")]
    FeeTooHigh(u64),

    #[error("fixed fee must be positive")]
    ZeroFee,

    #[error("vault output of {amount} exceeds the spend limit of {limit}")]
    SpendLimitExceeded { amount: u64, limit: u64 },

    #[error("address {0} is not on the vault whitelist")]
    NotWhitelisted(String),

    #[error("messages need the wallet's shared encrypting key")]
    NoEncryptingKey,

    #[error("server compromised: {0}")]
    ServerCompromised(String),

    #[error("could not build transaction: {0}")]
    CouldNotBuildTransaction(String),

    #[error("proposal {0} spends from a renewed vault and must be recreated")]
    StaleVault(String),

    #[error("copayer {0} already acted on this proposal")]
    AlreadyActed(String),

    #[error("copayer {0} is not in the wallet")]
    UnknownCopayer(String),

    #[error("invalid signature from copayer {0}")]
    InvalidSignature(String),

    #[error("invalid proposal record: {0}")]
    InvalidRecord(String),

    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}
