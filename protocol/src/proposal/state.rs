//! Typed proposal lifecycle.
//!
//! Each state owns its body; transitions consume `self`. Fields that only
//! exist in later states (the proposal signature, the action list, the
//! broadcast txid) live only on those types.

use chrono::Utc;
use tracing::{debug, info};

use super::types::{Action, ActionKind, ProposalBody, SpendSource};
use super::verify::{check_integrity, verified_threshold, verify_accept};
use super::ProposalError;
use crate::codec::{Encodable, Hash256, Transaction, SIGHASH_ALL};
use crate::credentials::Credentials;
use crate::crypto::keys::{PublicKey, Signature};
use crate::script::{multisig_input, pubkey_hash_input, vault_input, ScriptTemplate, VaultSigner};

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Built locally, not yet visible to other copayers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    body: ProposalBody,
}

impl Draft {
    pub(crate) fn new(body: ProposalBody) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &ProposalBody {
        &self.body
    }

    pub fn id(&self) -> &str {
        &self.body.id
    }

    /// The unsigned transaction this draft describes.
    pub fn transaction(&self) -> Transaction {
        self.body.build_transaction()
    }

    /// Sign the canonical header with the creator's transaction-request
    /// key. ECDSA nonces are deterministic, so publishing the same draft
    /// twice yields the same signature.
    pub fn publish(self, credentials: &Credentials) -> Result<Pending, ProposalError> {
        if self.body.creator_id != credentials.copayer_id() {
            return Err(ProposalError::InvalidRecord("only the creator can publish a draft".into()));
        }
        let key = credentials.tx_request_private_key()?;
        let proposal_signature = key.sign_message(&self.body.signing_payload()?);
        debug!(txp_id = %self.body.id, "draft published");
        Ok(Pending {
            body: self.body,
            proposal_signature,
            actions: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Pending
// ---------------------------------------------------------------------------

/// Published and collecting actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    body: ProposalBody,
    proposal_signature: Signature,
    actions: Vec<Action>,
}

/// Result of recording an action on a pending proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOutcome {
    Pending(Pending),
    Accepted(Accepted),
}

impl Pending {
    pub(crate) fn from_parts(body: ProposalBody, proposal_signature: Signature, actions: Vec<Action>) -> Self {
        Self {
            body,
            proposal_signature,
            actions,
        }
    }

    pub fn body(&self) -> &ProposalBody {
        &self.body
    }

    pub fn id(&self) -> &str {
        &self.body.id
    }

    pub fn proposal_signature(&self) -> &Signature {
        &self.proposal_signature
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn has_acted(&self, copayer_id: &str) -> bool {
        self.actions.iter().any(|a| a.copayer_id == copayer_id)
    }

    pub fn accept_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_accept()).count()
    }

    pub fn reject_count(&self) -> usize {
        self.actions.len() - self.accept_count()
    }

    /// Produce this copayer's accept action.
    ///
    /// `server_tx` is the unsigned transaction the service holds for this
    /// proposal. It must match the local rebuild exactly. The decrypted
    /// master key lives only for the duration of this call.
    pub fn sign(
        &self,
        credentials: &Credentials,
        password: Option<&str>,
        server_tx: &[u8],
    ) -> Result<Action, ProposalError> {
        let copayer_id = credentials.copayer_id();
        if self.has_acted(copayer_id) {
            return Err(ProposalError::AlreadyActed(copayer_id.to_string()));
        }
        check_integrity(&self.body, &self.proposal_signature, credentials, server_tx)?;

        let tx = self.body.build_transaction();
        let master = credentials.unlocked_master(password)?;
        let mut signatures = Vec::with_capacity(self.body.inputs.len());
        for (index, input) in self.body.inputs.iter().enumerate() {
            let template = self.body.input_template(credentials, index)?;
            let script_code = template.script_code(self.body.network)?;
            let sighash = tx.signature_hash(index, script_code.as_bytes(), SIGHASH_ALL)?;
            let key = match &self.body.source {
                SpendSource::Wallet => credentials.signing_key(&master, &input.path)?,
                SpendSource::Vault {
                    params, signer_path, ..
                } => {
                    let key = credentials.signing_key(&master, signer_path)?;
                    if key.public_key() != params.spend_pub_key {
                        return Err(ProposalError::CouldNotBuildTransaction(
                            "this wallet does not hold the vault spend key".into(),
                        ));
                    }
                    key
                }
            };
            signatures.push(key.sign_hash(&sighash));
        }
        debug!(txp_id = %self.body.id, inputs = signatures.len(), "proposal signed");
        Ok(Action {
            copayer_id: copayer_id.to_string(),
            kind: ActionKind::Accept { signatures },
            created_on: Utc::now().timestamp(),
        })
    }

    /// Produce this copayer's reject action. Rejecting does not stop the
    /// others from accepting.
    pub fn reject(&self, credentials: &Credentials, comment: Option<String>) -> Result<Action, ProposalError> {
        let copayer_id = credentials.copayer_id();
        if self.has_acted(copayer_id) {
            return Err(ProposalError::AlreadyActed(copayer_id.to_string()));
        }
        Ok(Action {
            copayer_id: copayer_id.to_string(),
            kind: ActionKind::Reject { comment },
            created_on: Utc::now().timestamp(),
        })
    }

    /// Record an action. Accept signatures are verified against the
    /// copayer's keys before they count.
    pub fn add_action(mut self, action: Action, credentials: &Credentials) -> Result<PendingOutcome, ProposalError> {
        if credentials.ring_entry(&action.copayer_id).is_none() {
            return Err(ProposalError::UnknownCopayer(action.copayer_id));
        }
        if self.has_acted(&action.copayer_id) {
            return Err(ProposalError::AlreadyActed(action.copayer_id));
        }
        let required = verified_threshold(&self.body, credentials)?;
        if let ActionKind::Accept { signatures } = &action.kind {
            verify_accept(&self.body, credentials, &action.copayer_id, signatures)?;
        }
        self.actions.push(action);

        if self.accept_count() >= required {
            info!(txp_id = %self.body.id, accepts = self.accept_count(), "proposal accepted");
            return Ok(PendingOutcome::Accepted(Accepted {
                body: self.body,
                proposal_signature: self.proposal_signature,
                actions: self.actions,
            }));
        }
        Ok(PendingOutcome::Pending(self))
    }

    /// The service declared the proposal rejected.
    pub fn into_rejected(self) -> Rejected {
        Rejected {
            body: self.body,
            actions: self.actions,
        }
    }

    pub fn into_removed(self) -> Removed {
        Removed { id: self.body.id }
    }
}

// ---------------------------------------------------------------------------
// Accepted
// ---------------------------------------------------------------------------

/// Enough valid accepts to assemble the final transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    body: ProposalBody,
    proposal_signature: Signature,
    actions: Vec<Action>,
}

/// One verified signature ready for assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSignature {
    pub input_index: usize,
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl Accepted {
    pub(crate) fn from_parts(body: ProposalBody, proposal_signature: Signature, actions: Vec<Action>) -> Self {
        Self {
            body,
            proposal_signature,
            actions,
        }
    }

    pub fn body(&self) -> &ProposalBody {
        &self.body
    }

    pub fn id(&self) -> &str {
        &self.body.id
    }

    pub fn proposal_signature(&self) -> &Signature {
        &self.proposal_signature
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Every accept signature, verified, ordered by input index and then
    /// by signer key bytes. Submission order does not matter.
    pub fn ordered_signatures(&self, credentials: &Credentials) -> Result<Vec<InputSignature>, ProposalError> {
        let mut all = Vec::new();
        for action in &self.actions {
            if let ActionKind::Accept { signatures } = &action.kind {
                let verified = verify_accept(&self.body, credentials, &action.copayer_id, signatures)?;
                all.extend(verified.into_iter().map(|(input_index, public_key, signature)| InputSignature {
                    input_index,
                    public_key,
                    signature,
                }));
            }
        }
        all.sort_by(|a, b| {
            a.input_index
                .cmp(&b.input_index)
                .then_with(|| a.public_key.cmp(&b.public_key))
        });
        Ok(all)
    }

    /// The fully signed transaction.
    pub fn assemble(&self, credentials: &Credentials) -> Result<Transaction, ProposalError> {
        let signatures = self.ordered_signatures(credentials)?;
        let mut tx = self.body.build_transaction();
        let required = verified_threshold(&self.body, credentials)?;
        for index in 0..tx.inputs.len() {
            let template = self.body.input_template(credentials, index)?;
            let mut for_input: Vec<&InputSignature> = signatures.iter().filter(|s| s.input_index == index).collect();
            for_input.dedup_by_key(|s| s.public_key);
            if for_input.len() < required {
                return Err(ProposalError::CouldNotBuildTransaction(format!(
                    "input {} has {} of {} signatures",
                    index,
                    for_input.len(),
                    required
                )));
            }
            let first = for_input[0];
            let script_sig = match &template {
                ScriptTemplate::PubKeyHash { public_key } => pubkey_hash_input(&first.signature, public_key),
                ScriptTemplate::MultisigP2SH { .. } => {
                    let redeem = template.redeem_script()?.unwrap_or_default();
                    let sigs: Vec<Signature> = for_input.iter().take(required).map(|s| s.signature).collect();
                    multisig_input(&sigs, &redeem)
                }
                ScriptTemplate::VaultP2SH(params) => {
                    vault_input(&first.signature, &first.public_key, VaultSigner::Spend, params)?
                }
                ScriptTemplate::EasySendP2SH(_) => {
                    return Err(ProposalError::CouldNotBuildTransaction(
                        "easy-send outputs are not spent through proposals".into(),
                    ))
                }
            };
            tx.inputs[index].script_sig = script_sig.into_bytes();
        }
        Ok(tx)
    }

    /// The service accepted the raw transaction for propagation.
    pub fn into_broadcast(self, tx: &Transaction) -> Broadcast {
        let txid = tx.txid();
        info!(txp_id = %self.body.id, txid = %txid.to_hex(), "proposal broadcast");
        Broadcast {
            body: self.body,
            actions: self.actions,
            txid,
            raw: tx.encode(),
        }
    }

    pub fn into_removed(self) -> Removed {
        Removed { id: self.body.id }
    }
}

// ---------------------------------------------------------------------------
// Terminal states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    body: ProposalBody,
    actions: Vec<Action>,
}

impl Rejected {
    pub(crate) fn from_parts(body: ProposalBody, actions: Vec<Action>) -> Self {
        Self { body, actions }
    }

    pub fn body(&self) -> &ProposalBody {
        &self.body
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Start over with the same outputs under a fresh id.
    pub fn resubmit(&self, new_id: String) -> Draft {
        let mut body = self.body.clone();
        body.id = new_id;
        body.created_on = Utc::now().timestamp();
        Draft::new(body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    body: ProposalBody,
    actions: Vec<Action>,
    txid: Hash256,
    raw: Vec<u8>,
}

impl Broadcast {
    pub(crate) fn from_parts(body: ProposalBody, actions: Vec<Action>, txid: Hash256, raw: Vec<u8>) -> Self {
        Self {
            body,
            actions,
            txid,
            raw,
        }
    }

    pub fn body(&self) -> &ProposalBody {
        &self.body
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn txid(&self) -> Hash256 {
        self.txid
    }

    /// Signed transaction bytes; empty when only the txid is known.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub id: String,
}

/// A proposal in any state, as read back from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    Draft(Draft),
    Pending(Pending),
    Accepted(Accepted),
    Rejected(Rejected),
    Broadcast(Broadcast),
    Removed(Removed),
}

impl Proposal {
    pub fn id(&self) -> &str {
        match self {
            Proposal::Draft(p) => p.id(),
            Proposal::Pending(p) => p.id(),
            Proposal::Accepted(p) => p.id(),
            Proposal::Rejected(p) => &p.body.id,
            Proposal::Broadcast(p) => &p.body.id,
            Proposal::Removed(p) => &p.id,
        }
    }

    /// Body of a proposal that has not been broadcast or closed.
    pub fn live_body(&self) -> Option<&ProposalBody> {
        match self {
            Proposal::Draft(p) => Some(p.body()),
            Proposal::Pending(p) => Some(p.body()),
            Proposal::Accepted(p) => Some(p.body()),
            _ => None,
        }
    }

    /// Vault a live proposal spends from, if any.
    pub fn vault_id(&self) -> Option<&str> {
        self.live_body().and_then(ProposalBody::vault_id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::{create_draft, ProposalRequest};
    use super::super::fee::FeeRate;
    use super::super::fixtures::{pay, utxo, wallet};
    use super::*;
    use crate::codec::Decodable;
    use crate::credentials::CredentialsError;
    use crate::script::Instruction;

    /// 2-of-3 draft spending two inputs, published by copayer 0.
    fn pending() -> (Vec<Credentials>, Pending, Vec<u8>) {
        let w = wallet(2, 3);
        let request = ProposalRequest::new(
            vec![pay(&w[0], 500_000)],
            vec![utxo(&w[0], 0, 300_000, 2), utxo(&w[0], 1, 400_000, 2)],
        );
        let draft = create_draft(&w[0], request, FeeRate::PerKb(10_000)).unwrap();
        let server_tx = draft.transaction().encode();
        let pending = draft.publish(&w[0]).unwrap();
        (w, pending, server_tx)
    }

    fn expect_pending(outcome: PendingOutcome) -> Pending {
        match outcome {
            PendingOutcome::Pending(p) => p,
            PendingOutcome::Accepted(_) => panic!("accepted too early"),
        }
    }

    fn expect_accepted(outcome: PendingOutcome) -> Accepted {
        match outcome {
            PendingOutcome::Accepted(a) => a,
            PendingOutcome::Pending(_) => panic!("still pending"),
        }
    }

    #[test]
    fn two_accepts_reach_accepted() {
        let (w, p, raw) = pending();
        assert_eq!(p.body().inputs.len(), 2);
        let a0 = p.sign(&w[0], None, &raw).unwrap();
        let p = expect_pending(p.add_action(a0, &w[1]).unwrap());
        assert_eq!(p.accept_count(), 1);

        let a2 = p.sign(&w[2], None, &raw).unwrap();
        let accepted = expect_accepted(p.add_action(a2, &w[1]).unwrap());
        let tx = accepted.assemble(&w[1]).unwrap();
        assert_eq!(tx.inputs.len(), 2);
        for input in &tx.inputs {
            let ins = crate::script::Script::from_bytes(input.script_sig.clone()).instructions().unwrap();
            // OP_0, two signatures, redeem script
            assert_eq!(ins.len(), 4);
            assert!(matches!(ins[0], Instruction::Op(0)));
        }
        assert_eq!(Transaction::decode(&tx.encode()).unwrap(), tx);
    }

    #[test]
    fn submission_order_does_not_change_final_tx() {
        let (w, p, raw) = pending();
        let a0 = p.sign(&w[0], None, &raw).unwrap();
        let a1 = p.sign(&w[1], None, &raw).unwrap();

        let forward = expect_accepted(
            expect_pending(p.clone().add_action(a0.clone(), &w[2]).unwrap())
                .add_action(a1.clone(), &w[2])
                .unwrap(),
        );
        let backward = expect_accepted(
            expect_pending(p.add_action(a1, &w[2]).unwrap())
                .add_action(a0, &w[2])
                .unwrap(),
        );
        assert_eq!(forward.assemble(&w[2]).unwrap(), backward.assemble(&w[2]).unwrap());

        let sigs = forward.ordered_signatures(&w[2]).unwrap();
        assert!(sigs.windows(2).all(|s| (s[0].input_index, s[0].public_key) <= (s[1].input_index, s[1].public_key)));
    }

    #[test]
    fn tampered_server_transaction_is_server_compromised() {
        let (w, p, raw) = pending();
        let mut tx = Transaction::decode(&raw).unwrap();
        tx.outputs[0].value -= 1;
        tx.outputs[1].value += 1;
        let err = p.sign(&w[1], None, &tx.encode()).unwrap_err();
        assert!(matches!(err, ProposalError::ServerCompromised(_)));
    }

    #[test]
    fn forged_proposal_signature_is_server_compromised() {
        let (w, p, raw) = pending();
        let forged = Pending::from_parts(
            p.body().clone(),
            w[1].tx_request_private_key().unwrap().sign_message(b"something else"),
            Vec::new(),
        );
        assert!(matches!(
            forged.sign(&w[2], None, &raw),
            Err(ProposalError::ServerCompromised(_))
        ));
    }

    #[test]
    fn redirected_change_is_server_compromised() {
        let (w, p, _) = pending();
        let mut body = p.body().clone();
        let foreign: crate::address::Address = pay(&w[0], 1_000).address.parse().unwrap();
        if let Some(change) = body.change.as_mut() {
            change.address = foreign;
        }
        // A colluding creator key makes the header signature valid.
        let sig = w[0].tx_request_private_key().unwrap().sign_message(&body.signing_payload().unwrap());
        let forged = Pending::from_parts(body.clone(), sig, Vec::new());
        let raw = body.build_transaction().encode();
        assert!(matches!(
            forged.sign(&w[1], None, &raw),
            Err(ProposalError::ServerCompromised(_))
        ));
    }

    /// Copy of the pending body with `edit` applied, re-signed by the creator.
    fn resigned(w: &[Credentials], p: &Pending, edit: impl FnOnce(&mut ProposalBody)) -> Pending {
        let mut body = p.body().clone();
        edit(&mut body);
        let sig = w[0].tx_request_private_key().unwrap().sign_message(&body.signing_payload().unwrap());
        Pending::from_parts(body, sig, Vec::new())
    }

    #[test]
    fn lowered_threshold_is_refused() {
        let (w, p, raw) = pending();
        let a0 = p.sign(&w[0], None, &raw).unwrap();

        let one = resigned(&w, &p, |b| b.required_signatures = 1);
        assert!(matches!(one.sign(&w[1], None, &raw), Err(ProposalError::ServerCompromised(_))));
        assert!(matches!(
            one.clone().add_action(a0.clone(), &w[1]),
            Err(ProposalError::ServerCompromised(_))
        ));
        let accepted = Accepted::from_parts(one.body().clone(), *one.proposal_signature(), vec![a0]);
        assert!(matches!(accepted.assemble(&w[1]), Err(ProposalError::ServerCompromised(_))));

        let zero = resigned(&w, &p, |b| b.required_signatures = 0);
        let reject = zero.reject(&w[2], None).unwrap();
        assert!(matches!(
            zero.add_action(reject, &w[2]),
            Err(ProposalError::ServerCompromised(_))
        ));
    }

    #[test]
    fn honest_threshold_ignores_reject_only_history() {
        let (w, p, _) = pending();
        let reject = p.reject(&w[2], None).unwrap();
        let p = expect_pending(p.add_action(reject, &w[1]).unwrap());
        assert_eq!(p.accept_count(), 0);
    }

    #[test]
    fn overflowing_input_is_refused_without_panic() {
        let (w, p, raw) = pending();
        let huge = resigned(&w, &p, |b| b.inputs[0].satoshis = u64::MAX);
        assert!(matches!(huge.sign(&w[1], None, &raw), Err(ProposalError::ServerCompromised(_))));
    }

    #[test]
    fn invalid_accept_signature_rejected() {
        let (w, p, raw) = pending();
        let mut action = p.sign(&w[0], None, &raw).unwrap();
        // Claim copayer 0's signatures came from copayer 1.
        action.copayer_id = w[1].copayer_id().to_string();
        assert!(matches!(
            p.add_action(action, &w[2]),
            Err(ProposalError::InvalidSignature(_))
        ));
    }

    #[test]
    fn copayer_cannot_act_twice() {
        let (w, p, raw) = pending();
        let accept = p.sign(&w[0], None, &raw).unwrap();
        let p = expect_pending(p.add_action(accept, &w[0]).unwrap());
        assert!(matches!(p.sign(&w[0], None, &raw), Err(ProposalError::AlreadyActed(_))));
        assert!(matches!(p.reject(&w[0], None), Err(ProposalError::AlreadyActed(_))));
    }

    #[test]
    fn rejection_does_not_block_accepts() {
        let (w, p, raw) = pending();
        let reject = p.reject(&w[2], Some("no".into())).unwrap();
        let p = expect_pending(p.add_action(reject, &w[0]).unwrap());
        assert_eq!(p.reject_count(), 1);
        let a0 = p.sign(&w[0], None, &raw).unwrap();
        let a1 = p.sign(&w[1], None, &raw).unwrap();
        let p = expect_pending(p.add_action(a0, &w[0]).unwrap());
        assert!(matches!(p.add_action(a1, &w[0]).unwrap(), PendingOutcome::Accepted(_)));
    }

    #[test]
    fn encrypted_credentials_need_password_to_sign() {
        let (mut w, p, raw) = pending();
        w[1].encrypt_private_key_with_iterations("pw", crate::config::MIN_KDF_ITERATIONS).unwrap();
        assert_eq!(
            p.sign(&w[1], None, &raw).unwrap_err(),
            ProposalError::Credentials(CredentialsError::PrivateKeyEncrypted)
        );
        assert!(p.sign(&w[1], Some("pw"), &raw).is_ok());
        assert!(w[1].is_private_key_encrypted());
    }

    #[test]
    fn only_creator_publishes() {
        let w = wallet(2, 3);
        let request = ProposalRequest::new(vec![pay(&w[0], 10_000)], vec![utxo(&w[0], 0, 100_000, 1)]);
        let draft = create_draft(&w[0], request, FeeRate::Fixed(1_000)).unwrap();
        assert!(draft.clone().publish(&w[1]).is_err());
        let a = draft.clone().publish(&w[0]).unwrap();
        let b = draft.publish(&w[0]).unwrap();
        assert_eq!(a.proposal_signature(), b.proposal_signature());
    }

    #[test]
    fn single_signer_wallet_assembles_p2pkh() {
        let w = wallet(1, 1);
        let request = ProposalRequest::new(vec![pay(&w[0], 50_000)], vec![utxo(&w[0], 3, 100_000, 1)]);
        let draft = create_draft(&w[0], request, FeeRate::PerKb(5_000)).unwrap();
        let raw = draft.transaction().encode();
        let p = draft.publish(&w[0]).unwrap();
        let action = p.sign(&w[0], None, &raw).unwrap();
        let accepted = expect_accepted(p.add_action(action, &w[0]).unwrap());
        let tx = accepted.assemble(&w[0]).unwrap();
        let ins = crate::script::Script::from_bytes(tx.inputs[0].script_sig.clone()).instructions().unwrap();
        assert_eq!(ins.len(), 2);
        let broadcast = accepted.into_broadcast(&tx);
        assert_eq!(broadcast.txid(), tx.txid());
        assert_eq!(broadcast.raw(), tx.encode().as_slice());
    }

    #[test]
    fn rejected_can_be_resubmitted() {
        let (_, p, _) = pending();
        let rejected = p.into_rejected();
        let draft = rejected.resubmit("txp-2".into());
        assert_eq!(draft.id(), "txp-2");
        assert_eq!(draft.body().outputs, rejected.body().outputs);
    }
}
