//! # Referrals
//!
//! A referral activates an address on the network ("beaconing"). It is a
//! chain-of-custody link: which referral came before it, which key it
//! activates, and the hash of the invite code used.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┬──────────────────────┐
//! │ previous referral hash (32)  │ key id (20)  │ code hash (32)       │
//! └──────────────────────────────┴──────────────┴──────────────────────┘
//! ```
//!
//! All three fields are fixed-length with no prefixes, so a referral is
//! always exactly [`REFERRAL_SIZE`] bytes.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::{CodecError, Decodable, Encodable, Hash256, Reader};
use crate::config::HASH160_LENGTH;
use crate::crypto::hash::sha256;
use crate::crypto::keys::PublicKey;

/// Encoded size of a referral.
pub const REFERRAL_SIZE: usize = 32 + HASH160_LENGTH + 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Referral {
    pub previous_referral: Hash256,
    #[serde(with = "key_id_hex")]
    pub key_id: [u8; HASH160_LENGTH],
    pub code_hash: Hash256,
}

impl Referral {
    /// Referral activating `key`, redeeming `code` under `parent`.
    pub fn new(parent: Hash256, key: &PublicKey, code: &str) -> Self {
        Self {
            previous_referral: parent,
            key_id: key.key_id(),
            code_hash: Hash256::from_bytes(sha256(code.as_bytes())),
        }
    }

    /// Referral id: `SHA-256d` of the encoding.
    pub fn hash(&self) -> Hash256 {
        Hash256::digest(&self.encode())
    }

    /// Whether this referral activates `key`.
    pub fn activates(&self, key: &PublicKey) -> bool {
        self.key_id == key.key_id()
    }
}

impl Encodable for Referral {
    fn encode_to(&self, out: &mut BytesMut) {
        out.reserve(REFERRAL_SIZE);
        out.put_slice(self.previous_referral.as_bytes());
        out.put_slice(&self.key_id);
        out.put_slice(self.code_hash.as_bytes());
    }
}

impl Decodable for Referral {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        // Check the whole record up front so a short buffer reports the
        // full referral size, not whichever field happened to run out.
        if reader.remaining() < REFERRAL_SIZE {
            return Err(CodecError::InsufficientData {
                needed: REFERRAL_SIZE,
                remaining: reader.remaining(),
            });
        }
        Ok(Self {
            previous_referral: reader.read_hash()?,
            key_id: reader.read_array::<HASH160_LENGTH>()?,
            code_hash: reader.read_hash()?,
        })
    }
}

mod key_id_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::config::HASH160_LENGTH;

    pub fn serialize<S: Serializer>(bytes: &[u8; HASH160_LENGTH], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; HASH160_LENGTH], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != HASH160_LENGTH {
            return Err(serde::de::Error::custom("key id must be 20 bytes"));
        }
        let mut out = [0u8; HASH160_LENGTH];
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}
