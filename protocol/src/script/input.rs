//! Input scripts (scriptSig) for each spend condition.
//!
//! Every signature pushed here is DER followed by the one-byte sighash
//! type. Builders check that the signer actually belongs to the script
//! they are satisfying; a mismatch would produce bytes that parse but fail
//! on the network, so it is reported as
//! [`ScriptError::CouldNotBuildTransaction`] instead.

use super::opcodes::{OP_0, OP_1};
use super::templates::{easy_send_redeem_script, vault_redeem_script, EasySendParams, VaultParams};
use super::{Script, ScriptError};
use crate::codec::SIGHASH_ALL;
use crate::crypto::keys::{PublicKey, Signature};

/// Which branch of a vault script is being satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultSigner {
    /// Renewal / whitelist change. Selects the `OP_IF` branch.
    Master,
    /// Day-to-day transfer under the limit. Selects the `OP_ELSE` branch.
    Spend,
}

pub(crate) fn sig_bytes(sig: &Signature) -> Vec<u8> {
    let mut out = sig.to_der();
    out.push(SIGHASH_ALL as u8);
    out
}

/// `<sig> <pubkey>`
pub fn pubkey_hash_input(sig: &Signature, pubkey: &PublicKey) -> Script {
    Script::builder()
        .push_slice(&sig_bytes(sig))
        .push_key(pubkey)
        .into_script()
}

/// `OP_0 <sig_1> … <sig_m> <redeem>`
///
/// `signatures` must already be in the order of their keys inside the
/// redeem script; `OP_CHECKMULTISIG` walks both lists once.
pub fn multisig_input(signatures: &[Signature], redeem_script: &Script) -> Script {
    // Leading OP_0 feeds the off-by-one pop in OP_CHECKMULTISIG.
    let mut builder = Script::builder().push_opcode(OP_0);
    for sig in signatures {
        builder = builder.push_slice(&sig_bytes(sig));
    }
    builder.push_script(redeem_script).into_script()
}

/// `<sig> <signer pubkey> <redeem>`
///
/// The signer must be the receiver (redeem) or the sender (cancel). The
/// cancel path additionally needs the input's sequence set to the timeout,
/// which is the caller's job.
pub fn easy_send_input(
    sig: &Signature,
    signer: &PublicKey,
    params: &EasySendParams,
) -> Result<Script, ScriptError> {
    if *signer != params.receiver_pub_key && *signer != params.sender_pub_key {
        return Err(ScriptError::CouldNotBuildTransaction(
            "signing key is neither the easy-send receiver nor the sender".into(),
        ));
    }
    let redeem = easy_send_redeem_script(params)?;
    Ok(Script::builder()
        .push_slice(&sig_bytes(sig))
        .push_key(signer)
        .push_script(&redeem)
        .into_script())
}

/// `<sig> OP_1|OP_0 <redeem>`
pub fn vault_input(
    sig: &Signature,
    signer_key: &PublicKey,
    role: VaultSigner,
    params: &VaultParams,
) -> Result<Script, ScriptError> {
    let (expected, branch) = match role {
        VaultSigner::Master => (&params.master_pub_key, OP_1),
        VaultSigner::Spend => (&params.spend_pub_key, OP_0),
    };
    if signer_key != expected {
        return Err(ScriptError::CouldNotBuildTransaction(format!(
            "{:?} branch requires a different key",
            role
        )));
    }
    let redeem = vault_redeem_script(params)?;
    Ok(Script::builder()
        .push_slice(&sig_bytes(sig))
        .push_opcode(branch)
        .push_script(&redeem)
        .into_script())
}
