//! # Transactions
//!
//! ```text
//! version      i32 LE
//! inputs       varint n, then n × { prev txid (32) | prev index u32 | script varbytes | sequence u32 }
//! outputs      varint n, then n × { value u64 LE | script varbytes }
//! lock_time    u32 LE
//! ```
//!
//! The txid is `SHA-256d` of the full encoding. Signature hashes use the
//! legacy algorithm (see [`Transaction::signature_hash`]).

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::varint::{varint_size, write_var_bytes, write_varint};
use super::{CodecError, Decodable, Encodable, Hash256, Reader};

/// Sign all inputs and all outputs.
pub const SIGHASH_ALL: u32 = 0x01;

/// Sequence value that disables relative lock-time for an input.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Smallest possible encoded input: 32 + 4 + 1 + 4.
const MIN_INPUT_SIZE: usize = 41;
/// Smallest possible encoded output: 8 + 1.
const MIN_OUTPUT_SIZE: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    #[serde(with = "hex_bytes")]
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// Unsigned input spending `prevout`.
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    #[serde(with = "hex_bytes")]
    pub script_pubkey: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }
}

impl Transaction {
    pub fn txid(&self) -> Hash256 {
        Hash256::digest(&self.encode())
    }

    /// Exact encoded size in bytes.
    pub fn size(&self) -> usize {
        let inputs: usize = self
            .inputs
            .iter()
            .map(|i| 36 + varint_size(i.script_sig.len() as u64) + i.script_sig.len() + 4)
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|o| 8 + varint_size(o.script_pubkey.len() as u64) + o.script_pubkey.len())
            .sum();
        4 + varint_size(self.inputs.len() as u64)
            + inputs
            + varint_size(self.outputs.len() as u64)
            + outputs
            + 4
    }

    /// `None` when the output values overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |sum, o| sum.checked_add(o.value))
    }

    /// Legacy signature hash for input `index`.
    ///
    /// Every input script is blanked, the signed input gets `script_code`
    /// (the redeem script for P2SH), the sighash type is appended as a
    /// u32 and the result is hashed with SHA-256d. Only `SIGHASH_ALL` is
    /// used by the wallet.
    pub fn signature_hash(
        &self,
        index: usize,
        script_code: &[u8],
        sighash_type: u32,
    ) -> Result<[u8; 32], CodecError> {
        if index >= self.inputs.len() {
            return Err(CodecError::InputIndex {
                index,
                count: self.inputs.len(),
            });
        }
        let mut copy = self.clone();
        for (i, input) in copy.inputs.iter_mut().enumerate() {
            input.script_sig = if i == index { script_code.to_vec() } else { Vec::new() };
        }
        let mut out = BytesMut::with_capacity(copy.size() + 4);
        copy.encode_to(&mut out);
        out.put_u32_le(sighash_type);
        Ok(*Hash256::digest(&out).as_bytes())
    }
}

impl Encodable for OutPoint {
    fn encode_to(&self, out: &mut BytesMut) {
        out.put_slice(self.txid.as_bytes());
        out.put_u32_le(self.vout);
    }
}

impl Decodable for OutPoint {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            txid: reader.read_hash()?,
            vout: reader.read_u32_le()?,
        })
    }
}

impl Encodable for TxIn {
    fn encode_to(&self, out: &mut BytesMut) {
        self.prevout.encode_to(out);
        write_var_bytes(out, &self.script_sig);
        out.put_u32_le(self.sequence);
    }
}

impl Decodable for TxIn {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            prevout: OutPoint::decode_from(reader)?,
            script_sig: reader.read_var_bytes()?,
            sequence: reader.read_u32_le()?,
        })
    }
}

impl Encodable for TxOut {
    fn encode_to(&self, out: &mut BytesMut) {
        out.put_u64_le(self.value);
        write_var_bytes(out, &self.script_pubkey);
    }
}

impl Decodable for TxOut {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value: reader.read_u64_le()?,
            script_pubkey: reader.read_var_bytes()?,
        })
    }
}

impl Encodable for Transaction {
    fn encode_to(&self, out: &mut BytesMut) {
        out.put_i32_le(self.version);
        write_varint(out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode_to(out);
        }
        write_varint(out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode_to(out);
        }
        out.put_u32_le(self.lock_time);
    }
}

impl Decodable for Transaction {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let version = reader.read_i32_le()?;

        let declared = reader.read_varint()?;
        let n_inputs = reader.checked_len(declared, MIN_INPUT_SIZE)?;
        let mut inputs = Vec::with_capacity(n_inputs);
        for _ in 0..n_inputs {
            inputs.push(TxIn::decode_from(reader)?);
        }

        let declared = reader.read_varint()?;
        let n_outputs = reader.checked_len(declared, MIN_OUTPUT_SIZE)?;
        let mut outputs = Vec::with_capacity(n_outputs);
        for _ in 0..n_outputs {
            outputs.push(TxOut::decode_from(reader)?);
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time: reader.read_u32_le()?,
        })
    }
}

/// Serde adapter for script bytes as hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
