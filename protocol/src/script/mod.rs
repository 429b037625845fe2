//! # Script Builder
//!
//! Construction of spend conditions and the input scripts that satisfy
//! them.
//!
//! ## Architecture
//!
//! ```text
//!   ScriptBuilder ──► Script (raw bytes, hex on the wire)
//!        ▲
//!        │ used by
//!   templates.rs   multisig / vault / easy-send redeem scripts,
//!                  ScriptTemplate tagged union, addresses
//!   input.rs       scriptSig assembly per template
//! ```
//!
//! Every builder is a pure function of its *ordered* inputs. Reordering
//! public keys or whitelist entries changes the script bytes and therefore
//! the address; callers persist the exact order used at creation.

pub mod input;
pub mod opcodes;
pub mod templates;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::address::{Address, AddressKind};
use crate::crypto::hash::hash160;
use crate::crypto::keys::PublicKey;
use opcodes::*;

pub use input::{
    easy_send_input, multisig_input, pubkey_hash_input, vault_input, VaultSigner,
};
pub use templates::{
    build_easy_send_out, build_multisig_out, build_vault_out, EasySendParams, ScriptTemplate,
    SpendCondition, VaultParams, MAX_MULTISIG_KEYS,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("invalid multisig threshold {m}-of-{n}")]
    InvalidThreshold { m: usize, n: usize },

    #[error("too many public keys: {0} (max 16)")]
    TooManyKeys(usize),

    #[error("duplicate public key in script")]
    DuplicateKey,

    #[error("vault whitelist is empty")]
    EmptyWhitelist,

    #[error("invalid timeout: {0}")]
    InvalidTimeout(u32),

    #[error("malformed script: {0}")]
    Malformed(String),

    #[error("could not build transaction: {0}")]
    CouldNotBuildTransaction(String),
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// Raw script bytes.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn builder() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, ScriptError> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|e| ScriptError::Malformed(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// `HASH160` of the script, as committed to by P2SH outputs.
    pub fn script_hash(&self) -> [u8; 20] {
        hash160(&self.0)
    }

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn pay_to_pubkey_hash(hash: &[u8; 20]) -> Self {
        Self::builder()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(hash)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .into_script()
    }

    /// `OP_HASH160 <hash> OP_EQUAL`
    pub fn pay_to_script_hash(hash: &[u8; 20]) -> Self {
        Self::builder()
            .push_opcode(OP_HASH160)
            .push_slice(hash)
            .push_opcode(OP_EQUAL)
            .into_script()
    }

    /// Output script paying to `address`. Vault (parameterized) addresses
    /// are paid with the same hash-equality form as P2SH.
    pub fn for_address(address: &Address) -> Self {
        match address.kind {
            AddressKind::PubKeyHash => Self::pay_to_pubkey_hash(&address.hash),
            AddressKind::ScriptHash | AddressKind::ParamScriptHash => {
                Self::pay_to_script_hash(&address.hash)
            }
        }
    }

    /// Extract the 20-byte destination hash of a P2PKH or P2SH output.
    pub fn destination_hash(&self) -> Option<[u8; 20]> {
        let b = &self.0;
        let range = if b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == 20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
        {
            3..23
        } else if b.len() == 23 && b[0] == OP_HASH160 && b[1] == 20 && b[22] == OP_EQUAL {
            2..22
        } else {
            return None;
        };
        let mut out = [0u8; 20];
        out.copy_from_slice(&b[range]);
        Some(out)
    }

    /// Parse into instructions.
    pub fn instructions(&self) -> Result<Vec<Instruction>, ScriptError> {
        let mut out = Vec::new();
        let bytes = &self.0;
        let mut i = 0;
        while i < bytes.len() {
            let op = bytes[i];
            i += 1;
            let len = match op {
                0x01..=0x4b => op as usize,
                OP_PUSHDATA1 => {
                    let n = *bytes.get(i).ok_or_else(|| truncated(i))? as usize;
                    i += 1;
                    n
                }
                OP_PUSHDATA2 => {
                    let raw = bytes.get(i..i + 2).ok_or_else(|| truncated(i))?;
                    i += 2;
                    u16::from_le_bytes([raw[0], raw[1]]) as usize
                }
                OP_PUSHDATA4 => {
                    let raw = bytes.get(i..i + 4).ok_or_else(|| truncated(i))?;
                    i += 4;
                    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
                }
                _ => {
                    out.push(Instruction::Op(op));
                    continue;
                }
            };
            let data = bytes.get(i..i + len).ok_or_else(|| truncated(i))?;
            out.push(Instruction::Push(data.to_vec()));
            i += len;
        }
        Ok(out)
    }

    /// Human-readable assembly.
    pub fn to_asm(&self) -> String {
        match self.instructions() {
            Ok(ins) => ins
                .iter()
                .map(|i| match i {
                    Instruction::Op(op) => match decode_small_int(*op) {
                        Some(n) if *op != OP_0 => n.to_string(),
                        _ => name(*op).to_string(),
                    },
                    Instruction::Push(data) => hex::encode(data),
                })
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => format!("<malformed {}>", self.to_hex()),
        }
    }
}

fn truncated(at: usize) -> ScriptError {
    ScriptError::Malformed(format!("push runs past end of script at byte {}", at))
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_asm())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Op(u8),
    Push(Vec<u8>),
}

// ---------------------------------------------------------------------------
// ScriptBuilder
// ---------------------------------------------------------------------------

/// Chained builder producing minimal pushes.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn push_opcode(mut self, op: u8) -> Self {
        self.bytes.push(op);
        self
    }

    pub fn push_slice(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.bytes.push(len as u8);
        } else if len <= 0xff {
            self.bytes.push(OP_PUSHDATA1);
            self.bytes.push(len as u8);
        } else if len <= 0xffff {
            self.bytes.push(OP_PUSHDATA2);
            self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.bytes.push(OP_PUSHDATA4);
            self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn push_key(self, key: &PublicKey) -> Self {
        self.push_slice(&key.to_bytes())
    }

    /// Push an integer using the smallest encoding: `OP_0`, `OP_1NEGATE`,
    /// `OP_1..OP_16`, or a minimal script-number push.
    pub fn push_int(self, n: i64) -> Self {
        match n {
            0 => self.push_opcode(OP_0),
            -1 => self.push_opcode(OP_1NEGATE),
            1..=16 => self.push_opcode(OP_1 + (n as u8) - 1),
            _ => self.push_slice(&encode_script_num(n)),
        }
    }

    pub fn push_script(self, script: &Script) -> Self {
        self.push_slice(script.as_bytes())
    }

    pub fn into_script(self) -> Script {
        Script(self.bytes)
    }
}

/// Minimal little-endian sign-magnitude encoding.
pub fn encode_script_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::with_capacity(9);
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    // The top bit is the sign; add a byte if the magnitude already uses it.
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}

/// Inverse of [`encode_script_num`].
pub fn decode_script_num(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    if bytes.len() > 8 {
        return None;
    }
    let mut value: i64 = 0;
    for (i, b) in bytes.iter().enumerate() {
        value |= (*b as i64) << (8 * i);
    }
    let last = bytes.len() - 1;
    if bytes[last] & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * last));
        Some(-(value & mask))
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_num_vectors() {
        assert_eq!(encode_script_num(0), Vec::<u8>::new());
        assert_eq!(encode_script_num(127), vec![0x7f]);
        assert_eq!(encode_script_num(128), vec![0x80, 0x00]);
        assert_eq!(encode_script_num(-1), vec![0x81]);
        assert_eq!(encode_script_num(1008), vec![0xf0, 0x03]);
        assert_eq!(encode_script_num(-128), vec![0x80, 0x80]);
        for n in [0i64, 1, -1, 127, 128, 255, 256, 1008, -32768, 2_100_000_000_000_000] {
            assert_eq!(decode_script_num(&encode_script_num(n)), Some(n), "n = {}", n);
        }
    }

    #[test]
    fn push_int_uses_small_opcodes() {
        let s = Script::builder().push_int(0).push_int(1).push_int(16).push_int(17).into_script();
        assert_eq!(s.as_bytes(), &[OP_0, OP_1, OP_16, 0x01, 17]);
    }

    #[test]
    fn push_slice_pushdata_forms() {
        let s = Script::builder().push_slice(&[0xAB; 75]).into_script();
        assert_eq!(s.as_bytes()[0], 75);
        let s = Script::builder().push_slice(&[0xAB; 76]).into_script();
        assert_eq!(&s.as_bytes()[..2], &[OP_PUSHDATA1, 76]);
        let s = Script::builder().push_slice(&[0xAB; 300]).into_script();
        assert_eq!(&s.as_bytes()[..3], &[OP_PUSHDATA2, 0x2c, 0x01]);
        assert_eq!(s.instructions().unwrap(), vec![Instruction::Push(vec![0xAB; 300])]);
    }

    #[test]
    fn truncated_push_is_malformed() {
        let s = Script::from_bytes(vec![0x05, 0x01]);
        assert!(matches!(s.instructions(), Err(ScriptError::Malformed(_))));
        assert!(s.to_asm().starts_with("<malformed"));
    }

    #[test]
    fn destination_hash_of_standard_outputs() {
        let h = [7u8; 20];
        assert_eq!(Script::pay_to_pubkey_hash(&h).destination_hash(), Some(h));
        assert_eq!(Script::pay_to_script_hash(&h).destination_hash(), Some(h));
        assert_eq!(Script::from_bytes(vec![OP_0]).destination_hash(), None);
    }

    #[test]
    fn asm_rendering() {
        let s = Script::pay_to_script_hash(&[0u8; 20]);
        assert_eq!(
            s.to_asm(),
            format!("OP_HASH160 {} OP_EQUAL", "00".repeat(20))
        );
    }
}
