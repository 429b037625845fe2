//! # Vaults
//!
//! A vault is a balance locked to a parameterized script with two keys:
//!
//! - the **spend key** (held by this wallet) moves at most `spend_limit`
//!   per output, and only to whitelisted destinations;
//! - the **master key** (usually kept offline) can move everything,
//!   which is how a vault is renewed with new parameters.
//!
//! Renewal changes the script and therefore the address. Any draft,
//! pending or accepted proposal still spending from the old script is
//! permanently stale: [`Vault::ensure_current`] reports it as
//! [`ProposalError::StaleVault`] and the proposal must be recreated.
//!
//! A new vault address must be activated by a referral before it can
//! originate spends; [`Vault::referral`] builds it and
//! [`Vault::activate`] records the confirmation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::address::{Address, AddressError};
use crate::codec::{CodecError, Hash256, Referral, Transaction, TxIn, TxOut, SIGHASH_ALL};
use crate::config::{DUST_THRESHOLD, MAX_AMOUNT};
use crate::credentials::{Credentials, CredentialsError};
use crate::crypto::hash::sha256;
use crate::crypto::hd::{DerivationPath, HdError};
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::proposal::fee::{estimate_size, FeeRate};
use crate::proposal::{
    create_draft, Draft, OutputRequest, Proposal, ProposalBody, ProposalError, ProposalRequest, SpendSource, Utxo,
};
use crate::script::{
    build_vault_out, vault_input, Script, ScriptError, ScriptTemplate, VaultParams, VaultSigner,
};

/// Account branch holding vault spend keys: `<account>/2/<index>`.
pub const VAULT_SPEND_BRANCH: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("output of {amount} exceeds the vault spend limit {limit}")]
    SpendLimitExceeded { amount: u64, limit: u64 },

    #[error("destination {0} is not on the vault whitelist")]
    NotWhitelisted(String),

    #[error("vault {0} is not active")]
    NotActive(String),

    #[error("key does not match the vault master key")]
    WrongMasterKey,

    #[error("amount {0} exceeds the maximum amount")]
    AmountTooLarge(u64),

    #[error("vault balance {available} does not cover the fee {fee}")]
    InsufficientFunds { available: u64, fee: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("derivation error: {0}")]
    Hd(#[from] HdError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Proposal(#[from] ProposalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    /// Waiting for the address referral to confirm.
    Pending,
    Active,
    /// Superseded by a renewal.
    Archived,
}

/// Parameters for a new vault.
#[derive(Debug, Clone)]
pub struct VaultRequest {
    pub name: String,
    pub master_pub_key: PublicKey,
    pub spend_limit: u64,
    /// Destination addresses, in the order they enter the script.
    pub whitelist: Vec<String>,
    /// Index of the spend key under [`VAULT_SPEND_BRANCH`].
    pub signer_index: u32,
}

/// Changes applied on renewal. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct VaultRenewal {
    pub spend_limit: Option<u64>,
    pub whitelist: Option<Vec<String>>,
    pub signer_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub id: String,
    pub name: String,
    pub status: VaultStatus,
    pub params: VaultParams,
    pub address: Address,
    /// Spend key path relative to the account root.
    pub signer_path: DerivationPath,
    /// Bumped on every renewal.
    pub generation: u32,
    pub created_on: i64,
}

fn parse_whitelist(credentials: &Credentials, whitelist: &[String]) -> Result<Vec<[u8; 20]>, VaultError> {
    whitelist
        .iter()
        .map(|a| Ok(Address::parse_for(a, credentials.network())?.hash))
        .collect()
}

impl Vault {
    pub fn create(credentials: &Credentials, request: VaultRequest) -> Result<Self, VaultError> {
        let vault = Self::build(
            credentials,
            Uuid::new_v4().to_string(),
            request.name,
            request.master_pub_key,
            request.spend_limit,
            parse_whitelist(credentials, &request.whitelist)?,
            request.signer_index,
            0,
        )?;
        info!(vault_id = %vault.id, address = %vault.address, "vault created");
        Ok(vault)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        credentials: &Credentials,
        id: String,
        name: String,
        master_pub_key: PublicKey,
        spend_limit: u64,
        whitelist: Vec<[u8; 20]>,
        signer_index: u32,
        generation: u32,
    ) -> Result<Self, VaultError> {
        if spend_limit > MAX_AMOUNT {
            return Err(VaultError::AmountTooLarge(spend_limit));
        }
        let signer_path = DerivationPath::default()
            .child(VAULT_SPEND_BRANCH)
            .child(signer_index);
        let spend_pub_key = credentials.xpub_key().derive_path(&signer_path)?.public_key();
        let condition = build_vault_out(
            &master_pub_key,
            &spend_pub_key,
            spend_limit,
            &whitelist,
            credentials.network(),
        )?;
        Ok(Self {
            id,
            name,
            status: VaultStatus::Pending,
            params: VaultParams {
                master_pub_key,
                spend_pub_key,
                spend_limit,
                whitelist,
            },
            address: condition.address,
            signer_path,
            generation,
            created_on: Utc::now().timestamp(),
        })
    }

    pub fn template(&self) -> ScriptTemplate {
        ScriptTemplate::VaultP2SH(self.params.clone())
    }

    pub fn redeem_script(&self) -> Result<Script, VaultError> {
        Ok(self.template().redeem_script()?.unwrap_or_default())
    }

    /// Referral activating the vault address.
    pub fn referral(&self, parent: Hash256, code: &str) -> Referral {
        Referral {
            previous_referral: parent,
            key_id: self.address.hash,
            code_hash: Hash256::from_bytes(sha256(code.as_bytes())),
        }
    }

    /// Mark the vault usable once its referral has confirmed.
    pub fn activate(&mut self) {
        if self.status == VaultStatus::Pending {
            self.status = VaultStatus::Active;
            debug!(vault_id = %self.id, "vault active");
        }
    }

    pub fn is_whitelisted(&self, address: &Address) -> bool {
        self.params.whitelist.contains(&address.hash)
    }

    /// Check outputs against the spend limit and whitelist.
    pub fn check_spend(&self, credentials: &Credentials, outputs: &[OutputRequest]) -> Result<(), VaultError> {
        for output in outputs {
            let address = Address::parse_for(&output.address, credentials.network())?;
            if output.amount > self.params.spend_limit {
                return Err(VaultError::SpendLimitExceeded {
                    amount: output.amount,
                    limit: self.params.spend_limit,
                });
            }
            if !self.is_whitelisted(&address) {
                return Err(VaultError::NotWhitelisted(output.address.clone()));
            }
        }
        Ok(())
    }

    /// Draft a spend-key transfer out of the vault. Change returns to the
    /// vault address.
    pub fn spend_draft(
        &self,
        credentials: &Credentials,
        mut request: ProposalRequest,
        rate: FeeRate,
    ) -> Result<Draft, VaultError> {
        if self.status != VaultStatus::Active {
            return Err(VaultError::NotActive(self.id.clone()));
        }
        self.check_spend(credentials, &request.outputs)?;
        request.source = SpendSource::Vault {
            vault_id: self.id.clone(),
            params: self.params.clone(),
            signer_path: self.signer_path.clone(),
        };
        Ok(create_draft(credentials, request, rate)?)
    }

    /// The successor vault. Same id, new script, generation + 1.
    pub fn renew(&self, credentials: &Credentials, changes: VaultRenewal) -> Result<Vault, VaultError> {
        let whitelist = match &changes.whitelist {
            Some(list) => parse_whitelist(credentials, list)?,
            None => self.params.whitelist.clone(),
        };
        let signer_index = match changes.signer_index {
            Some(index) => index,
            None => self.signer_path.indexes().last().copied().unwrap_or_default(),
        };
        let next = Self::build(
            credentials,
            self.id.clone(),
            self.name.clone(),
            self.params.master_pub_key,
            changes.spend_limit.unwrap_or(self.params.spend_limit),
            whitelist,
            signer_index,
            self.generation + 1,
        )?;
        info!(vault_id = %self.id, generation = next.generation, "vault renewed");
        Ok(next)
    }

    pub fn archive(&mut self) {
        self.status = VaultStatus::Archived;
    }

    /// Move every coin to `next` through the master-key branch.
    pub fn sweep_to(
        &self,
        next: &Vault,
        master: &PrivateKey,
        coins: &[Utxo],
        rate: FeeRate,
    ) -> Result<Transaction, VaultError> {
        let master_pub = master.public_key();
        if master_pub != self.params.master_pub_key {
            return Err(VaultError::WrongMasterKey);
        }
        let available = coins
            .iter()
            .try_fold(0u64, |sum, c| sum.checked_add(c.satoshis).filter(|s| *s <= MAX_AMOUNT))
            .ok_or(VaultError::AmountTooLarge(MAX_AMOUNT))?;
        let templates = vec![self.template(); coins.len()];
        let fee = rate.fee_for(estimate_size(&templates, &[next.address])?);
        let amount = available.saturating_sub(fee);
        if coins.is_empty() || amount < DUST_THRESHOLD {
            return Err(VaultError::InsufficientFunds { available, fee });
        }

        let redeem = self.redeem_script()?;
        let mut tx = Transaction {
            inputs: coins.iter().map(|c| TxIn::new(c.outpoint())).collect(),
            outputs: vec![TxOut {
                value: amount,
                script_pubkey: Script::for_address(&next.address).into_bytes(),
            }],
            ..Transaction::default()
        };
        let mut script_sigs = Vec::with_capacity(coins.len());
        for index in 0..tx.inputs.len() {
            let sighash = tx.signature_hash(index, redeem.as_bytes(), SIGHASH_ALL)?;
            let sig = master.sign_hash(&sighash);
            script_sigs.push(vault_input(&sig, &master_pub, VaultSigner::Master, &self.params)?);
        }
        for (input, script) in tx.inputs.iter_mut().zip(script_sigs) {
            input.script_sig = script.into_bytes();
        }
        debug!(vault_id = %self.id, inputs = coins.len(), amount, fee, "vault sweep built");
        Ok(tx)
    }

    /// Fail if `body` spends from an earlier script of this vault.
    pub fn ensure_current(&self, body: &ProposalBody) -> Result<(), ProposalError> {
        match &body.source {
            SpendSource::Vault { vault_id, params, .. } if *vault_id == self.id && *params != self.params => {
                Err(ProposalError::StaleVault(body.id.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Ids of live proposals made stale by a renewal of this vault.
    pub fn stale_proposals<'a>(&self, proposals: &'a [Proposal]) -> Vec<&'a str> {
        proposals
            .iter()
            .filter_map(Proposal::live_body)
            .filter(|body| self.ensure_current(body).is_err())
            .map(|body| body.id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::codec::Encodable;
    use crate::proposal::fixtures::wallet;
    use crate::proposal::PendingOutcome;

    fn whitelisted() -> (Address, Address) {
        let a = Address::from_public_key(Network::Testnet, &PrivateKey::generate().public_key());
        let b = Address::from_public_key(Network::Testnet, &PrivateKey::generate().public_key());
        (a, b)
    }

    fn vault(creds: &Credentials, master: &PrivateKey, allowed: &[Address]) -> Vault {
        let mut v = Vault::create(
            creds,
            VaultRequest {
                name: "savings".into(),
                master_pub_key: master.public_key(),
                spend_limit: 100_000,
                whitelist: allowed.iter().map(Address::to_string).collect(),
                signer_index: 0,
            },
        )
        .unwrap();
        v.activate();
        v
    }

    fn coin(v: &Vault, n: u8, satoshis: u64) -> Utxo {
        Utxo {
            txid: Hash256::digest(&[n]),
            vout: 0,
            satoshis,
            address: v.address,
            path: v.signer_path.clone(),
            confirmations: 6,
            locked: false,
        }
    }

    fn request(to: &Address, amount: u64, coins: Vec<Utxo>) -> ProposalRequest {
        ProposalRequest::new(
            vec![OutputRequest {
                address: to.to_string(),
                amount,
                message: None,
            }],
            coins,
        )
    }

    #[test]
    fn new_vault_waits_for_referral() {
        let w = wallet(1, 1);
        let master = PrivateKey::generate();
        let (a, _) = whitelisted();
        let mut v = Vault::create(
            &w[0],
            VaultRequest {
                name: "v".into(),
                master_pub_key: master.public_key(),
                spend_limit: 1_000,
                whitelist: vec![a.to_string()],
                signer_index: 3,
            },
        )
        .unwrap();
        assert_eq!(v.status, VaultStatus::Pending);
        assert_eq!(v.address.kind, crate::address::AddressKind::ParamScriptHash);
        let referral = v.referral(Hash256::ZERO, "invite");
        assert_eq!(referral.key_id, v.address.hash);
        v.activate();
        assert_eq!(v.status, VaultStatus::Active);
    }

    #[test]
    fn limit_and_whitelist_checked_before_drafting() {
        let w = wallet(1, 1);
        let master = PrivateKey::generate();
        let (a, b) = whitelisted();
        let v = vault(&w[0], &master, &[a]);
        let coins = vec![coin(&v, 1, 500_000)];

        assert_eq!(
            v.spend_draft(&w[0], request(&a, 100_001, coins.clone()), FeeRate::Fixed(1_000))
                .unwrap_err(),
            VaultError::SpendLimitExceeded {
                amount: 100_001,
                limit: 100_000
            }
        );
        assert!(matches!(
            v.spend_draft(&w[0], request(&b, 10_000, coins.clone()), FeeRate::Fixed(1_000)),
            Err(VaultError::NotWhitelisted(_))
        ));
        let draft = v
            .spend_draft(&w[0], request(&a, 100_000, coins), FeeRate::Fixed(1_000))
            .unwrap();
        let change = draft.body().change.as_ref().unwrap();
        assert_eq!(change.address, v.address);
        assert!(change.path.is_none());
    }

    #[test]
    fn pending_vault_cannot_spend() {
        let w = wallet(1, 1);
        let master = PrivateKey::generate();
        let (a, _) = whitelisted();
        let mut v = vault(&w[0], &master, &[a]);
        v.status = VaultStatus::Pending;
        assert!(matches!(
            v.spend_draft(&w[0], request(&a, 10_000, vec![coin(&v, 1, 50_000)]), FeeRate::Fixed(1_000)),
            Err(VaultError::NotActive(_))
        ));
    }

    #[test]
    fn spend_key_signs_through_proposal_flow() {
        let w = wallet(1, 1);
        let master = PrivateKey::generate();
        let (a, _) = whitelisted();
        let v = vault(&w[0], &master, &[a]);
        let draft = v
            .spend_draft(&w[0], request(&a, 40_000, vec![coin(&v, 1, 90_000)]), FeeRate::Fixed(1_000))
            .unwrap();
        let pending = draft.publish(&w[0]).unwrap();
        let server_tx = pending.body().build_transaction().encode();
        let action = pending.sign(&w[0], None, &server_tx).unwrap();
        let accepted = match pending.add_action(action, &w[0]).unwrap() {
            PendingOutcome::Accepted(a) => a,
            PendingOutcome::Pending(_) => panic!("one spend-key signature should be enough"),
        };
        let tx = accepted.assemble(&w[0]).unwrap();
        let ins = Script::from_bytes(tx.inputs[0].script_sig.clone()).instructions().unwrap();
        // <sig> OP_0 <redeem>
        assert_eq!(ins.len(), 3);
        assert_eq!(ins[1], crate::script::Instruction::Op(0));
    }

    #[test]
    fn over_limit_vault_proposal_is_not_signed() {
        let w = wallet(1, 1);
        let master = PrivateKey::generate();
        let (a, _) = whitelisted();
        let v = vault(&w[0], &master, &[a]);
        let draft = v
            .spend_draft(&w[0], request(&a, 40_000, vec![coin(&v, 1, 300_000)]), FeeRate::Fixed(1_000))
            .unwrap();

        // Balanced, correctly signed by the creator, but past the limit.
        let mut body = draft.body().clone();
        body.outputs[0].amount += 70_000;
        if let Some(change) = body.change.as_mut() {
            change.amount -= 70_000;
        }
        let sig = w[0].tx_request_private_key().unwrap().sign_message(&body.signing_payload().unwrap());
        let raw = body.build_transaction().encode();
        let forged = crate::proposal::Pending::from_parts(body, sig, Vec::new());
        assert!(matches!(
            forged.sign(&w[0], None, &raw),
            Err(ProposalError::ServerCompromised(_))
        ));
    }

    #[test]
    fn renewal_makes_old_proposals_stale() {
        let w = wallet(1, 1);
        let master = PrivateKey::generate();
        let (a, b) = whitelisted();
        let v = vault(&w[0], &master, &[a]);
        let draft = v
            .spend_draft(&w[0], request(&a, 40_000, vec![coin(&v, 1, 90_000)]), FeeRate::Fixed(1_000))
            .unwrap();
        assert!(v.ensure_current(draft.body()).is_ok());

        let next = v
            .renew(
                &w[0],
                VaultRenewal {
                    whitelist: Some(vec![a.to_string(), b.to_string()]),
                    ..VaultRenewal::default()
                },
            )
            .unwrap();
        assert_eq!(next.id, v.id);
        assert_eq!(next.generation, 1);
        assert_ne!(next.address, v.address);
        assert_eq!(
            next.ensure_current(draft.body()),
            Err(ProposalError::StaleVault(draft.id().to_string()))
        );
        let id = draft.id().to_string();
        let proposals = vec![Proposal::Draft(draft)];
        assert_eq!(next.stale_proposals(&proposals), vec![id.as_str()]);
    }

    #[test]
    fn sweep_requires_master_key() {
        let w = wallet(1, 1);
        let master = PrivateKey::generate();
        let (a, _) = whitelisted();
        let v = vault(&w[0], &master, &[a]);
        let next = v.renew(&w[0], VaultRenewal { spend_limit: Some(5_000), ..Default::default() }).unwrap();
        let coins = vec![coin(&v, 1, 80_000), coin(&v, 2, 20_000)];

        assert_eq!(
            v.sweep_to(&next, &PrivateKey::generate(), &coins, FeeRate::Fixed(2_000)),
            Err(VaultError::WrongMasterKey)
        );
        let huge = vec![coin(&v, 3, u64::MAX), coin(&v, 4, 1)];
        assert_eq!(
            v.sweep_to(&next, &master, &huge, FeeRate::Fixed(2_000)),
            Err(VaultError::AmountTooLarge(MAX_AMOUNT))
        );
        let tx = v.sweep_to(&next, &master, &coins, FeeRate::Fixed(2_000)).unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 98_000);
        assert_eq!(tx.outputs[0].script_pubkey, Script::for_address(&next.address).into_bytes());
        for input in &tx.inputs {
            let ins = Script::from_bytes(input.script_sig.clone()).instructions().unwrap();
            assert_eq!(ins[1], crate::script::Instruction::Op(crate::script::opcodes::OP_1));
        }
    }
}
