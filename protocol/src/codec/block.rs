//! # Block Structure
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  BlockHeader (80 bytes)                     │
//! │  ├── version: i32                           │
//! │  ├── prev_block: Hash256                    │
//! │  ├── merkle_root: Hash256                   │
//! │  ├── time: u32                              │
//! │  ├── bits: u32                              │
//! │  └── nonce: u32                             │
//! ├─────────────────────────────────────────────┤
//! │  transactions: varint n + n × Transaction   │
//! ├─────────────────────────────────────────────┤
//! │  invites: varint n + n × Transaction        │  only if version >= 3
//! ├─────────────────────────────────────────────┤
//! │  referrals: varint n + n × Referral (84 B)  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The invites section is version-gated: older blocks simply do not have
//! it, and every byte offset after the transaction list shifts
//! accordingly.
//!
//! ## Merkle Root
//!
//! `merkle_root` in the header commits to the txids of `transactions`
//! (see [`super::merkle`]). [`Block::valid_merkle_root`] recomputes it and
//! compares numerically against the declared value.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::merkle::merkle_root;
use super::referral::REFERRAL_SIZE;
use super::varint::write_varint;
use super::{CodecError, Decodable, Encodable, Hash256, Reader, Referral, Transaction};

/// Encoded header size.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// First header version that carries an invites section.
pub const INVITES_MIN_VERSION: i32 = 3;

/// Smallest possible encoded transaction: version, two empty counts, lock time.
const MIN_TX_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// BlockHeader
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Block hash: `SHA-256d` of the 80-byte header.
    pub fn hash(&self) -> Hash256 {
        Hash256::digest(&self.encode())
    }

    pub fn has_invites(&self) -> bool {
        self.version >= INVITES_MIN_VERSION
    }
}

impl Encodable for BlockHeader {
    fn encode_to(&self, out: &mut BytesMut) {
        out.reserve(BLOCK_HEADER_SIZE);
        out.put_i32_le(self.version);
        out.put_slice(self.prev_block.as_bytes());
        out.put_slice(self.merkle_root.as_bytes());
        out.put_u32_le(self.time);
        out.put_u32_le(self.bits);
        out.put_u32_le(self.nonce);
    }
}

impl Decodable for BlockHeader {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            version: reader.read_i32_le()?,
            prev_block: reader.read_hash()?,
            merkle_root: reader.read_hash()?,
            time: reader.read_u32_le()?,
            bits: reader.read_u32_le()?,
            nonce: reader.read_u32_le()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Always empty when `header.version < 3`.
    pub invites: Vec<Transaction>,
    pub referrals: Vec<Referral>,
}

impl Block {
    /// Assemble a block and fill in the header's merkle root.
    ///
    /// Invites are dropped for header versions that cannot carry them.
    pub fn new(
        mut header: BlockHeader,
        transactions: Vec<Transaction>,
        invites: Vec<Transaction>,
        referrals: Vec<Referral>,
    ) -> Self {
        let invites = if header.has_invites() { invites } else { Vec::new() };
        header.merkle_root = merkle_root(&transactions.iter().map(Transaction::txid).collect::<Vec<_>>());
        Self {
            header,
            transactions,
            invites,
            referrals,
        }
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn compute_merkle_root(&self) -> Hash256 {
        let txids: Vec<Hash256> = self.transactions.iter().map(Transaction::txid).collect();
        merkle_root(&txids)
    }

    /// Declared root equals the recomputed root (numeric comparison).
    pub fn valid_merkle_root(&self) -> bool {
        self.header.merkle_root.cmp(&self.compute_merkle_root()) == std::cmp::Ordering::Equal
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

impl Encodable for Block {
    fn encode_to(&self, out: &mut BytesMut) {
        self.header.encode_to(out);
        write_varint(out, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode_to(out);
        }
        if self.header.has_invites() {
            write_varint(out, self.invites.len() as u64);
            for invite in &self.invites {
                invite.encode_to(out);
            }
        }
        write_varint(out, self.referrals.len() as u64);
        for referral in &self.referrals {
            referral.encode_to(out);
        }
    }
}

fn decode_tx_list(reader: &mut Reader<'_>) -> Result<Vec<Transaction>, CodecError> {
    let declared = reader.read_varint()?;
    let count = reader.checked_len(declared, MIN_TX_SIZE)?;
    let mut txs = Vec::with_capacity(count);
    for _ in 0..count {
        txs.push(Transaction::decode_from(reader)?);
    }
    Ok(txs)
}

impl Decodable for Block {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let header = BlockHeader::decode_from(reader)?;
        let transactions = decode_tx_list(reader)?;
        let invites = if header.has_invites() {
            decode_tx_list(reader)?
        } else {
            Vec::new()
        };

        let declared = reader.read_varint()?;
        let count = reader.checked_len(declared, REFERRAL_SIZE)?;
        let mut referrals = Vec::with_capacity(count);
        for _ in 0..count {
            referrals.push(Referral::decode_from(reader)?);
        }

        Ok(Self {
            header,
            transactions,
            invites,
            referrals,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
