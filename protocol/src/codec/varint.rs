//! Bounds-checked reader and compact-size varints.
//!
//! `bytes::Buf` panics on underflow, so every read goes through
//! [`Reader::need`] first and returns `InsufficientData` instead.

use bytes::{Buf, BufMut, BytesMut};

use super::{CodecError, Hash256};

/// Upper bound on any declared count or length (32 MiB).
const MAX_DECLARED_LEN: u64 = 0x0200_0000;

/// Cursor over a borrowed buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn need(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::InsufficientData {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i32_le(&mut self) -> Result<i32, CodecError> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_u64_le(&mut self) -> Result<u64, CodecError> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub fn read_hash(&mut self) -> Result<Hash256, CodecError> {
        self.read_array::<32>().map(Hash256::from_bytes)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        self.need(len)?;
        let out = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(out)
    }

    /// Compact-size integer. Non-minimal encodings are rejected so that
    /// re-encoding is byte-exact.
    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        let value = match self.read_u8()? {
            0xFD => {
                let v = self.read_u16_le()? as u64;
                if v < 0xFD {
                    return Err(CodecError::NonCanonicalVarInt);
                }
                v
            }
            0xFE => {
                let v = self.read_u32_le()? as u64;
                if v <= 0xFFFF {
                    return Err(CodecError::NonCanonicalVarInt);
                }
                v
            }
            0xFF => {
                let v = self.read_u64_le()?;
                if v <= 0xFFFF_FFFF {
                    return Err(CodecError::NonCanonicalVarInt);
                }
                v
            }
            small => small as u64,
        };
        Ok(value)
    }

    /// Varint-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_varint()?;
        let len = self.checked_len(len, 1)?;
        self.read_bytes(len)
    }

    /// Validate a declared element count against what is left in the
    /// buffer, given the smallest possible element size.
    pub fn checked_len(&self, declared: u64, min_element_size: usize) -> Result<usize, CodecError> {
        if declared > MAX_DECLARED_LEN {
            return Err(CodecError::Oversized(declared));
        }
        let declared = declared as usize;
        let needed = declared.saturating_mul(min_element_size.max(1));
        if needed > self.remaining() {
            return Err(CodecError::InsufficientData {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(declared)
    }
}

pub fn write_varint(out: &mut BytesMut, value: u64) {
    match value {
        0..=0xFC => out.put_u8(value as u8),
        0xFD..=0xFFFF => {
            out.put_u8(0xFD);
            out.put_u16_le(value as u16);
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.put_u8(0xFE);
            out.put_u32_le(value as u32);
        }
        _ => {
            out.put_u8(0xFF);
            out.put_u64_le(value);
        }
    }
}

pub fn write_var_bytes(out: &mut BytesMut, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.put_slice(bytes);
}

/// Encoded size of a varint.
pub fn varint_size(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut out = BytesMut::new();
        write_varint(&mut out, value);
        out.to_vec()
    }

    #[test]
    fn varint_boundaries() {
        for (value, len) in [
            (0u64, 1usize),
            (0xFC, 1),
            (0xFD, 3),
            (0xFFFF, 3),
            (0x1_0000, 5),
            (0xFFFF_FFFF, 5),
            (0x1_0000_0000, 9),
        ] {
            let bytes = encode(value);
            assert_eq!(bytes.len(), len, "value {:#x}", value);
            assert_eq!(varint_size(value), len);
            assert_eq!(Reader::new(&bytes).read_varint().unwrap(), value);
        }
    }

    #[test]
    fn non_canonical_varint_rejected() {
        assert_eq!(
            Reader::new(&[0xFD, 0x10, 0x00]).read_varint(),
            Err(CodecError::NonCanonicalVarInt)
        );
        assert_eq!(
            Reader::new(&[0xFE, 0xFF, 0xFF, 0x00, 0x00]).read_varint(),
            Err(CodecError::NonCanonicalVarInt)
        );
    }

    #[test]
    fn short_reads_report_insufficient_data() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert_eq!(
            reader.read_u32_le(),
            Err(CodecError::InsufficientData { needed: 4, remaining: 3 })
        );
        // A failed read consumes nothing.
        assert_eq!(reader.remaining(), 3);
    }

    #[test]
    fn var_bytes_length_beyond_buffer() {
        let mut reader = Reader::new(&[0x05, 0xAA, 0xBB]);
        assert!(matches!(
            reader.read_var_bytes(),
            Err(CodecError::InsufficientData { .. })
        ));
    }
}
