//! # Remote Sync & Auth
//!
//! Everything that talks to the coordinating service.
//!
//! ```text
//! wire.rs           request / response bodies
//! signing.rs        `method|url|body` request signatures
//! transport.rs      Transport trait + reqwest implementation
//! session.rs        shared session token with single-flight refresh
//! client.rs         RemoteClient: auth, endpoints, proposal round-trips
//! notifications.rs  cancellable notification poller
//! retry.rs          caller-side retry for transient failures
//! ```
//!
//! ## Authentication
//!
//! Every request carries `x-identity` (the copayer id) and either
//! `x-session` or `x-signature`. A rejected request triggers exactly one
//! re-login and retry; a second rejection is [`SyncError::NotAuthorized`].
//!
//! ## Failures
//!
//! The protocol layer never loops on its own. Transport failures and 5xx
//! responses come back as transient errors and the caller decides whether
//! to retry them (see [`retry::retry_transient`]). 4xx responses other
//! than auth failures are terminal.

pub mod client;
pub mod notifications;
pub mod retry;
pub mod session;
pub mod signing;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;
pub mod wire;

use thiserror::Error;

use crate::credentials::CredentialsError;
use crate::proposal::ProposalError;

pub use client::RemoteClient;
pub use notifications::{NotificationPoller, PollerHandle};
pub use retry::retry_transient;
pub use session::SessionCell;
pub use signing::{request_message, sign_request, verify_request};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("service unavailable (status {0})")]
    ServerUnavailable(u16),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("could not build transaction: {0}")]
    CouldNotBuildTransaction(String),

    #[error("copayer already voted on this proposal")]
    CopayerVoted,

    #[error("proposal already broadcast")]
    AlreadyBroadcast,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("wallet is full")]
    WalletFull,

    #[error("client upgrade needed")]
    UpgradeNeeded,

    #[error("service error {code}: {message}")]
    Remote { code: String, message: String },

    #[error("unexpected response (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Proposal(#[from] ProposalError),
}

impl SyncError {
    /// Whether a caller may retry the same request.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::NotAuthorized(_)
            | SyncError::Connection(_)
            | SyncError::Timeout
            | SyncError::ServerUnavailable(_) => true,
            SyncError::Proposal(ProposalError::FeeUnavailable(_)) => true,
            _ => false,
        }
    }
}

/// Map an application error code from the service.
pub fn map_error_code(code: &str, message: &str) -> SyncError {
    let message = message.to_string();
    match code {
        "NOT_AUTHORIZED" => SyncError::NotAuthorized(message),
        "INSUFFICIENT_FUNDS" | "INSUFFICIENT_FUNDS_FOR_FEE" | "LOCKED_FUNDS" | "UNAVAILABLE_UTXOS" => {
            SyncError::InsufficientFunds(message)
        }
        "INVALID_ADDRESS" | "INCORRECT_ADDRESS_NETWORK" | "INVALID_CHANGE_ADDRESS" => {
            SyncError::InvalidAddress(message)
        }
        "DUST_AMOUNT" | "TX_MAX_SIZE_EXCEEDED" | "TX_CANNOT_CREATE" | "BAD_SIGNATURES" => {
            SyncError::CouldNotBuildTransaction(message)
        }
        "COPAYER_VOTED" => SyncError::CopayerVoted,
        "TX_ALREADY_BROADCASTED" => SyncError::AlreadyBroadcast,
        "WALLET_NOT_FOUND" | "TX_NOT_FOUND" | "VAULT_NOT_FOUND" => SyncError::NotFound(message),
        "WALLET_FULL" => SyncError::WalletFull,
        "UPGRADE_NEEDED" => SyncError::UpgradeNeeded,
        _ => SyncError::Remote {
            code: code.to_string(),
            message,
        },
    }
}
