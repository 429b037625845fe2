//! # Binary Codec
//!
//! Bit-exact (de)serialization of the chain records the wallet touches:
//! transactions, blocks (with version-gated invites) and referrals, plus
//! the merkle root over a block's transactions.
//!
//! ## Contract
//!
//! - `decode(bytes)` either consumes the whole buffer or fails. Short input
//!   is [`CodecError::InsufficientData`], never a silent truncation.
//! - `encode(decode(x)) == x` for every well-formed `x`.
//! - All integers are little-endian; counts and byte-string lengths use the
//!   canonical compact-size varint.

pub mod block;
pub mod hash256;
pub mod merkle;
pub mod referral;
pub mod transaction;
pub mod varint;

use bytes::BytesMut;
use thiserror::Error;

pub use block::{Block, BlockHeader, BLOCK_HEADER_SIZE, INVITES_MIN_VERSION};
pub use hash256::Hash256;
pub use merkle::merkle_root;
pub use referral::{Referral, REFERRAL_SIZE};
pub use transaction::{OutPoint, Transaction, TxIn, TxOut, SIGHASH_ALL};
pub use varint::Reader;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("insufficient data: needed {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },

    #[error("non-canonical varint encoding")]
    NonCanonicalVarInt,

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("length {0} exceeds the input size")]
    Oversized(u64),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("input index {index} out of range ({count} inputs)")]
    InputIndex { index: usize, count: usize },
}

/// A record with a canonical binary encoding.
pub trait Encodable {
    fn encode_to(&self, out: &mut BytesMut);

    fn encode(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        self.encode_to(&mut out);
        out.to_vec()
    }

    fn encode_hex(&self) -> String {
        hex::encode(self.encode())
    }
}

/// A record that can be read back from its canonical encoding.
pub trait Decodable: Sized {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError>;

    /// Decode a complete buffer. Leftover bytes are an error.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let record = Self::decode_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }
        Ok(record)
    }

    fn decode_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }
}
