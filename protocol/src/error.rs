//! Crate-wide error taxonomy.
//!
//! Each module keeps its own precise error enum. Front-ends that only need
//! to know *what kind* of failure happened convert into [`WalletError`],
//! which is the set of outcomes a user-facing layer has to handle.

use thiserror::Error;

use crate::address::AddressError;
use crate::codec::CodecError;
use crate::collab::CollabError;
use crate::config::ConfigError;
use crate::credentials::CredentialsError;
use crate::crypto::{EncryptionError, HdError, KeyError};
use crate::easysend::EasySendError;
use crate::proposal::ProposalError;
use crate::script::ScriptError;
use crate::sync::retry::Transient;
use crate::sync::SyncError;
use crate::vault::VaultError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("invalid backup: {0}")]
    InvalidBackup(String),

    #[error("server compromised: {0}")]
    ServerCompromised(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("service unavailable (status {0})")]
    ServerUnavailable(u16),

    #[error("could not build transaction: {0}")]
    CouldNotBuildTransaction(String),

    #[error("wrong password")]
    WrongPassword,

    #[error("wrong password or corrupt data")]
    WrongPasswordOrCorruptData,

    #[error("amount {0} exceeds the maximum amount")]
    AmountTooLarge(u64),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("fee unavailable: {0}")]
    FeeUnavailable(String),

    #[error("service error {code}: {message}")]
    Remote { code: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A local precondition failed (locked key, stale vault, repeated vote).
    #[error("{0}")]
    Invalid(String),
}

impl WalletError {
    /// Whether repeating the failed call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WalletError::NotAuthorized(_)
                | WalletError::Connection(_)
                | WalletError::ServerUnavailable(_)
                | WalletError::FeeUnavailable(_)
        )
    }

    fn remote(code: &str, message: impl Into<String>) -> Self {
        WalletError::Remote {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Transient for WalletError {
    fn is_transient(&self) -> bool {
        WalletError::is_transient(self)
    }
}

impl From<CodecError> for WalletError {
    fn from(e: CodecError) -> Self {
        WalletError::Decode(e.to_string())
    }
}

impl From<KeyError> for WalletError {
    fn from(e: KeyError) -> Self {
        WalletError::Decode(e.to_string())
    }
}

impl From<HdError> for WalletError {
    fn from(e: HdError) -> Self {
        match e {
            HdError::InvalidEncoding(_) => WalletError::Decode(e.to_string()),
            other => WalletError::Invalid(other.to_string()),
        }
    }
}

impl From<AddressError> for WalletError {
    fn from(e: AddressError) -> Self {
        WalletError::InvalidAddress(e.to_string())
    }
}

impl From<ScriptError> for WalletError {
    fn from(e: ScriptError) -> Self {
        WalletError::CouldNotBuildTransaction(e.to_string())
    }
}

impl From<EncryptionError> for WalletError {
    fn from(e: EncryptionError) -> Self {
        match e {
            EncryptionError::WrongPassword => WalletError::WrongPassword,
            EncryptionError::WrongPasswordOrCorruptData
            | EncryptionError::CorruptData
            | EncryptionError::DecryptFailed => WalletError::WrongPasswordOrCorruptData,
            other => WalletError::Invalid(other.to_string()),
        }
    }
}

impl From<ConfigError> for WalletError {
    fn from(e: ConfigError) -> Self {
        WalletError::Config(e.to_string())
    }
}

impl From<CredentialsError> for WalletError {
    fn from(e: CredentialsError) -> Self {
        match e {
            CredentialsError::Hd(e) => e.into(),
            CredentialsError::Key(e) => e.into(),
            CredentialsError::Encryption(e) => e.into(),
            CredentialsError::Script(e) => e.into(),
            CredentialsError::InvalidSecret(msg) => WalletError::InvalidSecret(msg),
            CredentialsError::InvalidBackup(msg) | CredentialsError::InvalidMnemonic(msg) => {
                WalletError::InvalidBackup(msg)
            }
            other => WalletError::Invalid(other.to_string()),
        }
    }
}

impl From<ProposalError> for WalletError {
    fn from(e: ProposalError) -> Self {
        match e {
            ProposalError::AmountTooLarge(amount) => WalletError::AmountTooLarge(amount),
            ProposalError::InvalidAddress(e) => e.into(),
            ProposalError::InsufficientFunds { .. } => WalletError::InsufficientFunds(e.to_string()),
            ProposalError::FeeUnavailable(msg) => WalletError::FeeUnavailable(msg),
            ProposalError::ServerCompromised(msg) => WalletError::ServerCompromised(msg),
            ProposalError::CouldNotBuildTransaction(msg) => WalletError::CouldNotBuildTransaction(msg),
            ProposalError::NoOutputs
            | ProposalError::DustOutput(_)
            | ProposalError::FeeTooHigh(_)
            | ProposalError::ZeroFee
            | ProposalError::SpendLimitExceeded { .. }
            | ProposalError::NotWhitelisted(_) => WalletError::CouldNotBuildTransaction(e.to_string()),
            ProposalError::InvalidRecord(_) => WalletError::Decode(e.to_string()),
            ProposalError::Credentials(e) => e.into(),
            ProposalError::Script(e) => e.into(),
            ProposalError::Codec(e) => e.into(),
            ProposalError::Encryption(e) => e.into(),
            other => WalletError::Invalid(other.to_string()),
        }
    }
}

impl From<SyncError> for WalletError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::NotAuthorized(msg) => WalletError::NotAuthorized(msg),
            SyncError::Connection(msg) => WalletError::Connection(msg),
            SyncError::Timeout => WalletError::Connection("request timed out".into()),
            SyncError::ServerUnavailable(status) => WalletError::ServerUnavailable(status),
            SyncError::InsufficientFunds(msg) => WalletError::InsufficientFunds(msg),
            SyncError::InvalidAddress(msg) => WalletError::InvalidAddress(msg),
            SyncError::CouldNotBuildTransaction(msg) => WalletError::CouldNotBuildTransaction(msg),
            SyncError::CopayerVoted => WalletError::remote("COPAYER_VOTED", e.to_string()),
            SyncError::AlreadyBroadcast => WalletError::remote("TX_ALREADY_BROADCASTED", e.to_string()),
            SyncError::NotFound(msg) => WalletError::remote("NOT_FOUND", msg),
            SyncError::WalletFull => WalletError::remote("WALLET_FULL", e.to_string()),
            SyncError::UpgradeNeeded => WalletError::remote("UPGRADE_NEEDED", e.to_string()),
            SyncError::Remote { code, message } => WalletError::Remote { code, message },
            SyncError::Http { status, message } => WalletError::remote(&format!("HTTP_{}", status), message),
            SyncError::InvalidResponse(msg) => WalletError::Decode(msg),
            SyncError::Credentials(e) => e.into(),
            SyncError::Proposal(e) => e.into(),
        }
    }
}

impl From<VaultError> for WalletError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::AmountTooLarge(amount) => WalletError::AmountTooLarge(amount),
            VaultError::InsufficientFunds { .. } => WalletError::InsufficientFunds(e.to_string()),
            VaultError::SpendLimitExceeded { .. } | VaultError::NotWhitelisted(_) => {
                WalletError::CouldNotBuildTransaction(e.to_string())
            }
            VaultError::InvalidAddress(e) => e.into(),
            VaultError::Hd(e) => e.into(),
            VaultError::Script(e) => e.into(),
            VaultError::Codec(e) => e.into(),
            VaultError::Credentials(e) => e.into(),
            VaultError::Proposal(e) => e.into(),
            other => WalletError::Invalid(other.to_string()),
        }
    }
}

impl From<EasySendError> for WalletError {
    fn from(e: EasySendError) -> Self {
        match e {
            EasySendError::InvalidReceipt(msg) => WalletError::InvalidSecret(msg),
            EasySendError::CouldNotBuildTransaction(msg) => WalletError::CouldNotBuildTransaction(msg),
            EasySendError::NoFunds | EasySendError::InsufficientFunds { .. } => {
                WalletError::InsufficientFunds(e.to_string())
            }
            EasySendError::Key(e) => e.into(),
            EasySendError::Script(e) => e.into(),
            EasySendError::Codec(e) => e.into(),
            EasySendError::InvalidAddress(e) => e.into(),
        }
    }
}

impl From<CollabError> for WalletError {
    fn from(e: CollabError) -> Self {
        match e {
            CollabError::Sync(e) => e.into(),
            CollabError::Unavailable(msg) => WalletError::Connection(msg),
            CollabError::NotFound(_) => WalletError::Invalid(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;

    #[test]
    fn transient_kinds() {
        assert!(WalletError::from(SyncError::Timeout).is_transient());
        assert!(WalletError::from(SyncError::ServerUnavailable(503)).is_transient());
        assert!(WalletError::from(ProposalError::FeeUnavailable("normal".into())).is_transient());
        assert!(!WalletError::from(SyncError::CopayerVoted).is_transient());
        assert!(!WalletError::WrongPassword.is_transient());
    }

    #[test]
    fn nested_errors_reach_their_kind() {
        let e: WalletError = SyncError::Proposal(ProposalError::Credentials(CredentialsError::Encryption(
            EncryptionError::WrongPassword,
        )))
        .into();
        assert_eq!(e, WalletError::WrongPassword);

        let e: WalletError = VaultError::Proposal(ProposalError::ServerCompromised("txp".into())).into();
        assert_eq!(e, WalletError::ServerCompromised("txp".into()));
    }

    #[test]
    fn address_errors_are_invalid_address() {
        let e: WalletError = ProposalError::InvalidAddress(AddressError::WrongNetwork {
            expected: Network::Livenet,
            found: Network::Testnet,
        })
        .into();
        assert!(matches!(e, WalletError::InvalidAddress(_)));
    }

    #[test]
    fn unmapped_codes_stay_remote() {
        let e: WalletError = SyncError::Remote {
            code: "NEW_CODE".into(),
            message: "m".into(),
        }
        .into();
        assert_eq!(
            e,
            WalletError::Remote {
                code: "NEW_CODE".into(),
                message: "m".into()
            }
        );
    }

    #[test]
    fn bad_receipt_is_invalid_secret() {
        let e: WalletError = EasySendError::InvalidReceipt("checksum".into()).into();
        assert_eq!(e, WalletError::InvalidSecret("checksum".into()));
    }
}
