//! Redeem-script templates: multisig, vault and easy-send.
//!
//! ## Multisig
//!
//! ```text
//! OP_m <pk_1> … <pk_n> OP_n OP_CHECKMULTISIG
//! ```
//!
//! Keys appear in the order given. Wallet code sorts the ring before
//! calling, so the on-chain order is ascending pubkey bytes.
//!
//! ## Vault
//!
//! ```text
//! OP_IF
//!     <master> OP_CHECKSIG
//! OP_ELSE
//!     <spend> OP_CHECKSIGVERIFY
//!     OP_0 OP_OUTPUTAMOUNT <limit> OP_LESSTHANOREQUAL OP_VERIFY
//!     OP_0 OP_OUTPUTHASH <wl_1> … <wl_k> <k> OP_ANYVALUE
//! OP_ENDIF
//! ```
//!
//! ## Easy-send
//!
//! ```text
//! OP_DUP <receiver> OP_EQUAL
//! OP_IF
//!     OP_CHECKSIG
//! OP_ELSE
//!     OP_DUP <sender> OP_EQUALVERIFY
//!     <timeout> OP_CHECKSEQUENCEVERIFY OP_DROP
//!     OP_CHECKSIG
//! OP_ENDIF
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::opcodes::*;
use super::{Script, ScriptError};
use crate::address::{Address, Network};
use crate::crypto::keys::PublicKey;

/// `OP_CHECKMULTISIG` with small-int thresholds tops out at 16 keys.
pub const MAX_MULTISIG_KEYS: usize = 16;

/// Largest relative lock-time (in blocks) a CSV input sequence can carry.
const MAX_CSV_BLOCKS: u32 = 0xFFFF;

// ---------------------------------------------------------------------------
// Multisig
// ---------------------------------------------------------------------------

/// m-of-n multisig redeem script over `pubkeys` in the given order.
pub fn build_multisig_out(pubkeys: &[PublicKey], m: usize) -> Result<Script, ScriptError> {
    let n = pubkeys.len();
    if n > MAX_MULTISIG_KEYS {
        return Err(ScriptError::TooManyKeys(n));
    }
    if m == 0 || n == 0 || m > n {
        return Err(ScriptError::InvalidThreshold { m, n });
    }
    let unique: HashSet<_> = pubkeys.iter().collect();
    if unique.len() != n {
        return Err(ScriptError::DuplicateKey);
    }

    let mut builder = Script::builder().push_int(m as i64);
    for key in pubkeys {
        builder = builder.push_key(key);
    }
    Ok(builder
        .push_int(n as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script())
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultParams {
    pub master_pub_key: PublicKey,
    pub spend_pub_key: PublicKey,
    pub spend_limit: u64,
    /// Destination hashes (HASH160 of pubkey or script), in creation order.
    #[serde(with = "whitelist_hex")]
    pub whitelist: Vec<[u8; 20]>,
}

/// A redeem script together with the address committing to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendCondition {
    pub redeem_script: Script,
    pub address: Address,
}

pub fn build_vault_out(
    master_pub: &PublicKey,
    spend_pub: &PublicKey,
    spend_limit: u64,
    whitelist: &[[u8; 20]],
    network: Network,
) -> Result<SpendCondition, ScriptError> {
    let params = VaultParams {
        master_pub_key: *master_pub,
        spend_pub_key: *spend_pub,
        spend_limit,
        whitelist: whitelist.to_vec(),
    };
    let redeem_script = vault_redeem_script(&params)?;
    let address = Address::from_param_script(network, redeem_script.as_bytes());
    Ok(SpendCondition {
        redeem_script,
        address,
    })
}

pub(crate) fn vault_redeem_script(params: &VaultParams) -> Result<Script, ScriptError> {
    if params.whitelist.is_empty() {
        return Err(ScriptError::EmptyWhitelist);
    }
    if params.master_pub_key == params.spend_pub_key {
        return Err(ScriptError::DuplicateKey);
    }
    let limit = i64::try_from(params.spend_limit)
        .map_err(|_| ScriptError::Malformed("spend limit out of range".into()))?;

    let mut builder = Script::builder()
        .push_opcode(OP_IF)
        .push_key(&params.master_pub_key)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_key(&params.spend_pub_key)
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_int(0)
        .push_opcode(OP_OUTPUTAMOUNT)
        .push_int(limit)
        .push_opcode(OP_LESSTHANOREQUAL)
        .push_opcode(OP_VERIFY)
        .push_int(0)
        .push_opcode(OP_OUTPUTHASH);
    for entry in &params.whitelist {
        builder = builder.push_slice(entry);
    }
    Ok(builder
        .push_int(params.whitelist.len() as i64)
        .push_opcode(OP_ANYVALUE)
        .push_opcode(OP_ENDIF)
        .into_script())
}

// ---------------------------------------------------------------------------
// Easy-send
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EasySendParams {
    pub receiver_pub_key: PublicKey,
    pub sender_pub_key: PublicKey,
    /// Relative timeout in blocks.
    pub timeout: u32,
}

/// `pubkeys` is `[receiver, sender]`.
pub fn build_easy_send_out(
    pubkeys: [PublicKey; 2],
    block_timeout: u32,
    network: Network,
) -> Result<SpendCondition, ScriptError> {
    let params = EasySendParams {
        receiver_pub_key: pubkeys[0],
        sender_pub_key: pubkeys[1],
        timeout: block_timeout,
    };
    let redeem_script = easy_send_redeem_script(&params)?;
    let address = Address::from_script(network, redeem_script.as_bytes());
    Ok(SpendCondition {
        redeem_script,
        address,
    })
}

pub(crate) fn easy_send_redeem_script(params: &EasySendParams) -> Result<Script, ScriptError> {
    if params.timeout == 0 || params.timeout > MAX_CSV_BLOCKS {
        return Err(ScriptError::InvalidTimeout(params.timeout));
    }
    if params.receiver_pub_key == params.sender_pub_key {
        return Err(ScriptError::DuplicateKey);
    }
    Ok(Script::builder()
        .push_opcode(OP_DUP)
        .push_key(&params.receiver_pub_key)
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_DUP)
        .push_key(&params.sender_pub_key)
        .push_opcode(OP_EQUALVERIFY)
        .push_int(params.timeout as i64)
        .push_opcode(OP_CHECKSEQUENCEVERIFY)
        .push_opcode(OP_DROP)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script())
}

// ---------------------------------------------------------------------------
// ScriptTemplate
// ---------------------------------------------------------------------------

/// Everything needed to rebuild a spend condition byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScriptTemplate {
    PubKeyHash {
        #[serde(rename = "publicKey")]
        public_key: PublicKey,
    },
    MultisigP2SH {
        m: usize,
        /// Ring order used at creation time.
        #[serde(rename = "publicKeys")]
        public_keys: Vec<PublicKey>,
    },
    VaultP2SH(VaultParams),
    EasySendP2SH(EasySendParams),
}

impl ScriptTemplate {
    /// The redeem script, if this template is script-hashed.
    pub fn redeem_script(&self) -> Result<Option<Script>, ScriptError> {
        Ok(match self {
            ScriptTemplate::PubKeyHash { .. } => None,
            ScriptTemplate::MultisigP2SH { m, public_keys } => {
                Some(build_multisig_out(public_keys, *m)?)
            }
            ScriptTemplate::VaultP2SH(params) => Some(vault_redeem_script(params)?),
            ScriptTemplate::EasySendP2SH(params) => Some(easy_send_redeem_script(params)?),
        })
    }

    pub fn address(&self, network: Network) -> Result<Address, ScriptError> {
        Ok(match self {
            ScriptTemplate::PubKeyHash { public_key } => {
                Address::from_public_key(network, public_key)
            }
            ScriptTemplate::VaultP2SH(params) => {
                Address::from_param_script(network, vault_redeem_script(params)?.as_bytes())
            }
            other => {
                // Multisig and easy-send are plain P2SH.
                let redeem = other.redeem_script()?.unwrap_or_default();
                Address::from_script(network, redeem.as_bytes())
            }
        })
    }

    pub fn script_pubkey(&self, network: Network) -> Result<Script, ScriptError> {
        Ok(Script::for_address(&self.address(network)?))
    }

    /// Script the signature hash commits to for inputs spending this
    /// template: the redeem script, or the P2PKH output script.
    pub fn script_code(&self, network: Network) -> Result<Script, ScriptError> {
        match self.redeem_script()? {
            Some(redeem) => Ok(redeem),
            None => self.script_pubkey(network),
        }
    }

    /// Number of signatures a spend needs.
    pub fn required_signatures(&self) -> usize {
        match self {
            ScriptTemplate::MultisigP2SH { m, .. } => *m,
            _ => 1,
        }
    }
}

mod whitelist_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(list: &[[u8; 20]], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(list.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<[u8; 20]>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| {
                let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
                <[u8; 20]>::try_from(bytes.as_slice())
                    .map_err(|_| serde::de::Error::custom("whitelist entry must be 20 bytes"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::script::Instruction;

    fn keys(n: usize) -> Vec<PublicKey> {
        (0..n).map(|_| PrivateKey::generate().public_key()).collect()
    }

    #[test]
    fn multisig_layout() {
        let pks = keys(3);
        let script = build_multisig_out(&pks, 2).unwrap();
        let ins = script.instructions().unwrap();
        assert_eq!(ins.len(), 6);
        assert_eq!(ins[0], Instruction::Op(OP_1 + 1));
        for (i, pk) in pks.iter().enumerate() {
            assert_eq!(ins[i + 1], Instruction::Push(pk.to_bytes().to_vec()));
        }
        assert_eq!(ins[4], Instruction::Op(OP_1 + 2));
        assert_eq!(ins[5], Instruction::Op(OP_CHECKMULTISIG));
    }

    #[test]
    fn multisig_is_deterministic_and_order_sensitive() {
        let pks = keys(3);
        let a = build_multisig_out(&pks, 2).unwrap();
        assert_eq!(a, build_multisig_out(&pks, 2).unwrap());
        let mut reversed = pks.clone();
        reversed.reverse();
        let b = build_multisig_out(&reversed, 2).unwrap();
        assert_ne!(a, b);
        assert_ne!(
            Address::from_script(Network::Livenet, a.as_bytes()),
            Address::from_script(Network::Livenet, b.as_bytes())
        );
    }

    #[test]
    fn multisig_rejects_bad_threshold() {
        let pks = keys(2);
        assert!(matches!(
            build_multisig_out(&pks, 3),
            Err(ScriptError::InvalidThreshold { m: 3, n: 2 })
        ));
        assert!(build_multisig_out(&pks, 0).is_err());
        assert!(build_multisig_out(&[], 1).is_err());
        assert_eq!(build_multisig_out(&keys(17), 2), Err(ScriptError::TooManyKeys(17)));
    }

    #[test]
    fn multisig_rejects_duplicate_keys() {
        let pk = keys(1)[0];
        assert_eq!(build_multisig_out(&[pk, pk], 1), Err(ScriptError::DuplicateKey));
    }

    #[test]
    fn vault_address_is_param_script_hash() {
        let pks = keys(2);
        let cond = build_vault_out(&pks[0], &pks[1], 100_000, &[[1u8; 20]], Network::Testnet).unwrap();
        assert_eq!(cond.address.kind, crate::address::AddressKind::ParamScriptHash);
        assert_eq!(cond.address.hash, cond.redeem_script.script_hash());
    }

    #[test]
    fn vault_whitelist_order_matters() {
        let pks = keys(2);
        let wl = [[1u8; 20], [2u8; 20]];
        let wl_rev = [[2u8; 20], [1u8; 20]];
        let a = build_vault_out(&pks[0], &pks[1], 10, &wl, Network::Livenet).unwrap();
        let b = build_vault_out(&pks[0], &pks[1], 10, &wl_rev, Network::Livenet).unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn vault_requires_whitelist() {
        let pks = keys(2);
        assert_eq!(
            build_vault_out(&pks[0], &pks[1], 10, &[], Network::Livenet),
            Err(ScriptError::EmptyWhitelist)
        );
    }

    #[test]
    fn easy_send_layout() {
        let pks = keys(2);
        let cond = build_easy_send_out([pks[0], pks[1]], 1008, Network::Livenet).unwrap();
        let ins = cond.redeem_script.instructions().unwrap();
        assert_eq!(ins[0], Instruction::Op(OP_DUP));
        assert_eq!(ins[1], Instruction::Push(pks[0].to_bytes().to_vec()));
        assert_eq!(ins[7], Instruction::Push(pks[1].to_bytes().to_vec()));
        assert_eq!(ins[9], Instruction::Push(vec![0xf0, 0x03]));
        assert_eq!(ins[10], Instruction::Op(OP_CHECKSEQUENCEVERIFY));
        assert_eq!(cond.address.kind, crate::address::AddressKind::ScriptHash);
    }

    #[test]
    fn easy_send_rejects_zero_timeout() {
        let pks = keys(2);
        assert_eq!(
            build_easy_send_out([pks[0], pks[1]], 0, Network::Livenet),
            Err(ScriptError::InvalidTimeout(0))
        );
    }

    #[test]
    fn template_address_matches_builders() {
        let pks = keys(3);
        let template = ScriptTemplate::MultisigP2SH {
            m: 2,
            public_keys: pks.clone(),
        };
        let redeem = build_multisig_out(&pks, 2).unwrap();
        assert_eq!(
            template.address(Network::Livenet).unwrap(),
            Address::from_script(Network::Livenet, redeem.as_bytes())
        );
        assert_eq!(template.required_signatures(), 2);
    }

    #[test]
    fn template_serde_roundtrip() {
        let pks = keys(2);
        let template = ScriptTemplate::VaultP2SH(VaultParams {
            master_pub_key: pks[0],
            spend_pub_key: pks[1],
            spend_limit: 5_000,
            whitelist: vec![[9u8; 20]],
        });
        let json = serde_json::to_string(&template).unwrap();
        assert!(json.contains("\"type\":\"vaultP2SH\""));
        assert_eq!(serde_json::from_str::<ScriptTemplate>(&json).unwrap(), template);
    }
}
