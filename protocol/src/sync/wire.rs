//! Request and response bodies exchanged with the coordinating service.
//!
//! Field names follow the service's camelCase JSON.

use serde::{Deserialize, Serialize};

use crate::address::{Address, Network};
use crate::codec::Hash256;
use crate::crypto::hd::{DerivationPath, ExtendedPubKey};
use crate::crypto::keys::{PublicKey, Signature};

/// Application error body returned with 4xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session: String,
}

// ---------------------------------------------------------------------------
// Wallets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    /// Encrypted with the shared encrypting key.
    pub name: String,
    pub m: usize,
    pub n: usize,
    /// Public half of the wallet key; joiners prove knowledge of the
    /// private half by signing their copayer data with it.
    pub pub_key: PublicKey,
    pub network: Network,
    /// Referral parent that activates the wallet's first address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletResponse {
    pub wallet_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWalletRequest {
    pub wallet_id: String,
    /// Copayer name, encrypted with the shared encrypting key.
    pub name: String,
    pub xpub_key: ExtendedPubKey,
    pub request_pub_key: PublicKey,
    pub tx_request_pub_key: PublicKey,
    /// Wallet-key signature over `name|xpub|requestPubKey`.
    pub copayer_signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopayerInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub xpub_key: ExtendedPubKey,
    pub request_pub_key: PublicKey,
    pub tx_request_pub_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub id: String,
    pub name: String,
    pub m: usize,
    pub n: usize,
    pub network: Network,
    /// `pending` until all copayers joined, then `complete`.
    pub status: String,
    #[serde(default)]
    pub copayers: Vec<CopayerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWalletResponse {
    pub copayer_id: String,
    pub wallet: WalletInfo,
}

// ---------------------------------------------------------------------------
// Referrals and addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRequest {
    /// Hex of the encoded referral.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralResponse {
    pub hash: Hash256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub address: Address,
    pub path: DerivationPath,
    #[serde(default)]
    pub public_keys: Vec<PublicKey>,
    /// Whether a confirmed referral activates this address.
    #[serde(default)]
    pub beaconed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAddressResponse {
    pub is_valid: bool,
    #[serde(default)]
    pub is_beaconed: bool,
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub proposal_signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturesRequest {
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    /// Hex of the fully signed transaction.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub txid: Hash256,
}

// ---------------------------------------------------------------------------
// Notifications, preferences, push
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Monotonic per wallet; later notifications sort after earlier ones.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub wallet_id: String,
    /// Copayer that caused the event, if any.
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_on: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub token: String,
    /// `ios`, `android` or `web`.
    pub platform: String,
}
