//! Integrity checks run before a copayer signs or assembles a proposal.
//!
//! The coordinating service is not trusted with anything that would let
//! it redirect funds. A copayer only signs after confirming, from its own
//! key ring, that:
//!
//! 1. the creator's proposal signature covers this exact body,
//! 2. the signature threshold matches the wallet's own scripts,
//! 3. every input and the change output belong to the wallet,
//! 4. vault spends respect the vault's limit and whitelist,
//! 5. the amounts balance,
//! 6. the transaction the service returned is byte-identical to the one
//!    rebuilt locally from the body.

use tracing::error;

use super::types::{ProposalBody, SpendSource};
use super::ProposalError;
use crate::address::Address;
use crate::codec::{CodecError, Encodable, SIGHASH_ALL};
use crate::credentials::{Credentials, CredentialsError, RingEntry};
use crate::crypto::keys::{PublicKey, Signature};
use crate::script::{ScriptTemplate, VaultParams};

/// Log and build a [`ProposalError::ServerCompromised`].
pub(crate) fn server_compromised(txp_id: &str, reason: impl Into<String>) -> ProposalError {
    let reason = reason.into();
    error!(txp_id, reason = %reason, "proposal failed integrity check; refusing to continue");
    ProposalError::ServerCompromised(reason)
}

pub fn verify_proposal_signature(
    body: &ProposalBody,
    signature: &Signature,
    credentials: &Credentials,
) -> Result<(), ProposalError> {
    let creator = credentials
        .ring_entry(&body.creator_id)
        .ok_or_else(|| server_compromised(&body.id, "creator is not a wallet copayer"))?;
    let payload = body.signing_payload()?;
    if !creator.tx_request_pub_key.verify_message(&payload, signature) {
        return Err(server_compromised(&body.id, "proposal signature does not match its creator"));
    }
    Ok(())
}

/// Threshold the wallet's scripts impose. A body claiming any other
/// `required_signatures` is refused.
pub fn verified_threshold(body: &ProposalBody, credentials: &Credentials) -> Result<usize, ProposalError> {
    let required = body.signature_threshold(credentials)?;
    if body.required_signatures != required {
        return Err(server_compromised(
            &body.id,
            format!("proposal claims {} signatures, wallet needs {}", body.required_signatures, required),
        ));
    }
    Ok(required)
}

/// Every payment from a vault stays within its per-output limit and goes
/// to a whitelisted address.
pub fn check_vault_outputs<'a>(
    params: &VaultParams,
    outputs: impl IntoIterator<Item = (&'a Address, u64)>,
) -> Result<(), ProposalError> {
    for (address, amount) in outputs {
        if amount > params.spend_limit {
            return Err(ProposalError::SpendLimitExceeded {
                amount,
                limit: params.spend_limit,
            });
        }
        if !params.whitelist.contains(&address.hash) {
            return Err(ProposalError::NotWhitelisted(address.to_string()));
        }
    }
    Ok(())
}

/// Full pre-signing check against the service's unsigned transaction.
pub fn check_integrity(
    body: &ProposalBody,
    proposal_signature: &Signature,
    credentials: &Credentials,
    server_tx: &[u8],
) -> Result<(), ProposalError> {
    if body.network != credentials.network() || Some(body.wallet_id.as_str()) != credentials.wallet_id() {
        return Err(server_compromised(&body.id, "proposal belongs to another wallet"));
    }
    verify_proposal_signature(body, proposal_signature, credentials)?;
    body.check_bounds()?;
    verified_threshold(body, credentials)?;

    if let Some(change) = &body.change {
        let owned = match (&body.source, &change.path) {
            (SpendSource::Wallet, Some(path)) => {
                credentials.derivation_strategy().is_address_path(path)
                    && credentials.derive_address_at(path)?.address == change.address
            }
            (SpendSource::Vault { params, .. }, None) => {
                ScriptTemplate::VaultP2SH(params.clone()).address(body.network)? == change.address
            }
            _ => false,
        };
        if !owned {
            return Err(server_compromised(&body.id, "change output does not return to the wallet"));
        }
    }

    if let SpendSource::Vault { params, .. } = &body.source {
        check_vault_outputs(params, body.outputs.iter().map(|o| (&o.to_address, o.amount)))
            .map_err(|e| server_compromised(&body.id, e.to_string()))?;
    }

    let change = body.change.as_ref().map_or(0, |c| c.amount);
    let spent = body.amount()?.checked_add(change).and_then(|s| s.checked_add(body.fee));
    if spent != Some(body.input_total()?) {
        return Err(server_compromised(&body.id, "inputs and outputs do not balance"));
    }

    if body.build_transaction().encode() != server_tx {
        return Err(server_compromised(&body.id, "transaction does not match the proposal"));
    }
    Ok(())
}

/// Key `entry` signs input `index` with.
pub fn signer_key(
    body: &ProposalBody,
    entry: &RingEntry,
    index: usize,
) -> Result<PublicKey, ProposalError> {
    match &body.source {
        SpendSource::Wallet => {
            let input = body.inputs.get(index).ok_or(CodecError::InputIndex {
                index,
                count: body.inputs.len(),
            })?;
            let derived = entry.xpub_key.derive_path(&input.path).map_err(CredentialsError::from)?;
            Ok(derived.public_key())
        }
        SpendSource::Vault { params, .. } => Ok(params.spend_pub_key),
    }
}

/// Verify an accept action's signatures, one per input. Returns
/// `(input index, signer key, signature)` for each.
pub fn verify_accept(
    body: &ProposalBody,
    credentials: &Credentials,
    copayer_id: &str,
    signatures: &[Signature],
) -> Result<Vec<(usize, PublicKey, Signature)>, ProposalError> {
    let entry = credentials
        .ring_entry(copayer_id)
        .ok_or_else(|| ProposalError::UnknownCopayer(copayer_id.to_string()))?;
    if signatures.len() != body.inputs.len() {
        return Err(ProposalError::InvalidSignature(copayer_id.to_string()));
    }
    let tx = body.build_transaction();
    let mut verified = Vec::with_capacity(signatures.len());
    for (index, signature) in signatures.iter().enumerate() {
        let template = body.input_template(credentials, index)?;
        let script_code = template.script_code(body.network)?;
        let sighash = tx.signature_hash(index, script_code.as_bytes(), SIGHASH_ALL)?;
        let key = signer_key(body, entry, index)?;
        if !key.verify_hash(&sighash, signature) {
            return Err(ProposalError::InvalidSignature(copayer_id.to_string()));
        }
        verified.push((index, key, *signature));
    }
    Ok(verified)
}
