//! Proposal vocabulary: fee policy, inputs, outputs, actions and the body
//! every lifecycle state carries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::verify::server_compromised;
use super::ProposalError;
use crate::address::{Address, Network};
use crate::codec::{CodecError, Hash256, OutPoint, Transaction, TxIn, TxOut};
use crate::config::MAX_AMOUNT;
use crate::credentials::Credentials;
use crate::crypto::hash::double_sha256;
use crate::crypto::hd::DerivationPath;
use crate::crypto::keys::Signature;
use crate::script::{Script, ScriptTemplate, VaultParams};

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Named fee levels the service quotes a per-kB rate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeLevel {
    Priority,
    Normal,
    Economy,
    SuperEconomy,
}

impl fmt::Display for FeeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Priority => "priority",
            Self::Normal => "normal",
            Self::Economy => "economy",
            Self::SuperEconomy => "superEconomy",
        })
    }
}

impl FromStr for FeeLevel {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(Self::Priority),
            "normal" => Ok(Self::Normal),
            "economy" => Ok(Self::Economy),
            "superEconomy" | "supereconomy" => Ok(Self::SuperEconomy),
            other => Err(ProposalError::FeeUnavailable(format!("unknown fee level {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FeePolicy {
    /// Absolute fee in the smallest unit.
    Fixed(u64),
    PerKb(u64),
    Level(FeeLevel),
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy::Level(FeeLevel::Normal)
    }
}

/// One row of the service's fee table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeLevelQuote {
    pub level: FeeLevel,
    pub fee_per_kb: u64,
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// A spendable output owned by the wallet (or one of its vaults).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub txid: Hash256,
    pub vout: u32,
    pub satoshis: u64,
    pub address: Address,
    /// Address path relative to the account root.
    pub path: DerivationPath,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub locked: bool,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalOutput {
    pub to_address: Address,
    pub amount: u64,
    /// Hex ciphertext under the shared encrypting key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOutput {
    pub address: Address,
    pub amount: u64,
    /// Wallet change path. Absent when change returns to a vault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<DerivationPath>,
}

/// Where the inputs of a proposal come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SpendSource {
    /// The wallet's own (possibly multisig) addresses.
    Wallet,
    /// A vault, spent through its spend-key branch.
    #[serde(rename_all = "camelCase")]
    Vault {
        vault_id: String,
        params: VaultParams,
        /// Path of the spend key relative to the account root.
        signer_path: DerivationPath,
    },
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionKind {
    /// One signature per input, in input order.
    Accept { signatures: Vec<Signature> },
    Reject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
}

/// A copayer's vote on a proposal. The action list only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub copayer_id: String,
    #[serde(flatten)]
    pub kind: ActionKind,
    pub created_on: i64,
}

impl Action {
    pub fn is_accept(&self) -> bool {
        matches!(self.kind, ActionKind::Accept { .. })
    }
}

// ---------------------------------------------------------------------------
// ProposalBody
// ---------------------------------------------------------------------------

/// Fields shared by every lifecycle state. Everything the transaction is
/// built from lives here, so any copayer can rebuild it independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalBody {
    pub id: String,
    pub wallet_id: String,
    pub creator_id: String,
    pub network: Network,
    pub outputs: Vec<ProposalOutput>,
    pub inputs: Vec<Utxo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeOutput>,
    pub fee: u64,
    pub fee_policy: FeePolicy,
    /// Rate the fee was computed with; zero for fixed fees.
    pub fee_per_kb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub required_signatures: usize,
    pub required_rejections: usize,
    pub source: SpendSource,
    pub created_on: i64,
}

/// The fields the creator's proposal signature commits to.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedHeader<'a> {
    id: &'a str,
    wallet_id: &'a str,
    network: Network,
    outputs: &'a [ProposalOutput],
    inputs: Vec<OutPoint>,
    change_address: Option<Address>,
    fee: u64,
    message: Option<&'a str>,
    required_signatures: usize,
}

/// Sum of `values`, failing once it passes [`MAX_AMOUNT`].
fn checked_total(values: impl IntoIterator<Item = u64>) -> Result<u64, ProposalError> {
    values.into_iter().try_fold(0u64, |total, value| {
        let next = total.saturating_add(value);
        if next > MAX_AMOUNT {
            return Err(ProposalError::AmountTooLarge(next));
        }
        Ok(next)
    })
}

impl ProposalBody {
    /// Sum of the payment outputs (change excluded).
    pub fn amount(&self) -> Result<u64, ProposalError> {
        checked_total(self.outputs.iter().map(|o| o.amount))
    }

    pub fn input_total(&self) -> Result<u64, ProposalError> {
        checked_total(self.inputs.iter().map(|u| u.satoshis))
    }

    /// Structural limits any body must satisfy, whoever built it. Amounts
    /// stay within [`MAX_AMOUNT`] and both thresholds are at least one.
    pub fn check_bounds(&self) -> Result<(), ProposalError> {
        if self.required_signatures == 0 || self.required_rejections == 0 {
            return Err(server_compromised(&self.id, "proposal thresholds must be positive"));
        }
        let change = self.change.as_ref().map(|c| c.amount);
        let within = self.amount().is_ok()
            && self.input_total().is_ok()
            && checked_total(change.into_iter().chain([self.fee])).is_ok();
        if !within {
            return Err(server_compromised(&self.id, "proposal amounts exceed the maximum amount"));
        }
        Ok(())
    }

    /// Signatures each input needs, derived from the wallet's own scripts
    /// rather than the body's `required_signatures` field.
    pub fn signature_threshold(&self, credentials: &Credentials) -> Result<usize, ProposalError> {
        let mut threshold = None;
        for index in 0..self.inputs.len() {
            let required = self.input_template(credentials, index)?.required_signatures();
            match threshold {
                Some(previous) if previous != required => {
                    return Err(server_compromised(&self.id, "inputs need different signature counts"));
                }
                _ => threshold = Some(required),
            }
        }
        threshold
            .filter(|required| *required > 0)
            .ok_or_else(|| server_compromised(&self.id, "proposal has no inputs"))
    }

    /// The unsigned transaction: inputs in order, payment outputs in order,
    /// change last.
    pub fn build_transaction(&self) -> Transaction {
        let inputs = self.inputs.iter().map(|u| TxIn::new(u.outpoint())).collect();
        let mut outputs: Vec<TxOut> = self
            .outputs
            .iter()
            .map(|o| TxOut {
                value: o.amount,
                script_pubkey: Script::for_address(&o.to_address).into_bytes(),
            })
            .collect();
        if let Some(change) = &self.change {
            outputs.push(TxOut {
                value: change.amount,
                script_pubkey: Script::for_address(&change.address).into_bytes(),
            });
        }
        Transaction {
            inputs,
            outputs,
            ..Transaction::default()
        }
    }

    /// Canonical bytes the creator signs with the transaction-request key.
    pub fn signing_payload(&self) -> Result<Vec<u8>, ProposalError> {
        let header = SignedHeader {
            id: &self.id,
            wallet_id: &self.wallet_id,
            network: self.network,
            outputs: &self.outputs,
            inputs: self.inputs.iter().map(Utxo::outpoint).collect(),
            change_address: self.change.as_ref().map(|c| c.address),
            fee: self.fee,
            message: self.message.as_deref(),
            required_signatures: self.required_signatures,
        };
        serde_json::to_vec(&header).map_err(|e| ProposalError::InvalidRecord(e.to_string()))
    }

    pub fn proposal_hash(&self) -> Result<Hash256, ProposalError> {
        Ok(Hash256::from_bytes(double_sha256(&self.signing_payload()?)))
    }

    /// Spend condition of input `index`, re-derived locally. The derived
    /// address must match what the input claims.
    pub fn input_template(
        &self,
        credentials: &Credentials,
        index: usize,
    ) -> Result<ScriptTemplate, ProposalError> {
        let input = self.inputs.get(index).ok_or(CodecError::InputIndex {
            index,
            count: self.inputs.len(),
        })?;
        let template = match &self.source {
            SpendSource::Wallet => credentials.derive_address_at(&input.path)?.template,
            SpendSource::Vault { params, .. } => ScriptTemplate::VaultP2SH(params.clone()),
        };
        if template.address(self.network)? != input.address {
            return Err(server_compromised(
                &self.id,
                format!("input {} does not belong to the wallet", index),
            ));
        }
        Ok(template)
    }

    pub fn vault_id(&self) -> Option<&str> {
        match &self.source {
            SpendSource::Vault { vault_id, .. } => Some(vault_id),
            SpendSource::Wallet => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;

    fn body() -> ProposalBody {
        let to = Address::from_public_key(Network::Testnet, &PrivateKey::generate().public_key());
        let from = Address::from_public_key(Network::Testnet, &PrivateKey::generate().public_key());
        ProposalBody {
            id: "txp-1".into(),
            wallet_id: "w".into(),
            creator_id: "c".into(),
            network: Network::Testnet,
            outputs: vec![ProposalOutput {
                to_address: to,
                amount: 500_000,
                message: None,
            }],
            inputs: vec![Utxo {
                txid: Hash256::digest(b"funding"),
                vout: 1,
                satoshis: 800_000,
                address: from,
                path: "m/0/0".parse().unwrap(),
                confirmations: 6,
                locked: false,
            }],
            change: Some(ChangeOutput {
                address: from,
                amount: 290_000,
                path: Some("m/1/0".parse().unwrap()),
            }),
            fee: 10_000,
            fee_policy: FeePolicy::PerKb(40_000),
            fee_per_kb: 40_000,
            message: None,
            required_signatures: 1,
            required_rejections: 1,
            source: SpendSource::Wallet,
            created_on: 1_700_000_000,
        }
    }

    #[test]
    fn transaction_puts_change_last() {
        let b = body();
        let tx = b.build_transaction();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 500_000);
        assert_eq!(tx.outputs[1].value, 290_000);
        assert_eq!(b.input_total().unwrap(), b.amount().unwrap() + b.fee + 290_000);
    }

    #[test]
    fn signing_payload_commits_to_outputs() {
        let a = body();
        let mut b = a.clone();
        b.outputs[0].amount += 1;
        assert_ne!(a.proposal_hash().unwrap(), b.proposal_hash().unwrap());
        // Bookkeeping fields outside the header do not change it.
        let mut c = a.clone();
        c.created_on += 5;
        assert_eq!(a.proposal_hash().unwrap(), c.proposal_hash().unwrap());
        let mut d = a.clone();
        d.required_signatures = 2;
        assert_ne!(a.proposal_hash().unwrap(), d.proposal_hash().unwrap());
    }

    #[test]
    fn oversized_amounts_fail_instead_of_wrapping() {
        let mut b = body();
        b.inputs.push(Utxo {
            satoshis: u64::MAX,
            ..b.inputs[0].clone()
        });
        assert!(matches!(b.input_total(), Err(ProposalError::AmountTooLarge(_))));
        assert!(matches!(b.check_bounds(), Err(ProposalError::ServerCompromised(_))));

        let mut fee = body();
        fee.fee = MAX_AMOUNT + 1;
        assert!(fee.check_bounds().is_err());

        let mut zero = body();
        zero.required_signatures = 0;
        assert!(matches!(zero.check_bounds(), Err(ProposalError::ServerCompromised(_))));
        assert!(body().check_bounds().is_ok());
    }

    #[test]
    fn action_wire_shape() {
        let action = Action {
            copayer_id: "abc".into(),
            kind: ActionKind::Reject {
                comment: Some("too much".into()),
            },
            created_on: 7,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "reject");
        assert_eq!(json["copayerId"], "abc");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
        assert!(!back.is_accept());
    }

    #[test]
    fn fee_policy_wire_shape() {
        let json = serde_json::to_value(FeePolicy::Level(FeeLevel::SuperEconomy)).unwrap();
        assert_eq!(json["type"], "level");
        assert_eq!(json["value"], "superEconomy");
        assert_eq!("normal".parse::<FeeLevel>().unwrap(), FeeLevel::Normal);
        assert!("cheap".parse::<FeeLevel>().is_err());
    }
}
