//! Opcode byte values.
//!
//! The standard set plus the output-introspection opcodes used by vault
//! scripts (`0xc0` range).

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;

pub const OP_IF: u8 = 0x63;
pub const OP_NOTIF: u8 = 0x64;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;

pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_SWAP: u8 = 0x7c;

pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;

pub const OP_LESSTHANOREQUAL: u8 = 0xa1;

pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;

pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;

// Output introspection.

/// Push the amount of output `n` (popped).
pub const OP_OUTPUTAMOUNT: u8 = 0xc0;
/// Push the 20-byte destination hash of output `n` (popped).
pub const OP_OUTPUTHASH: u8 = 0xc1;
/// Push the number of outputs.
pub const OP_OUTPUTCOUNT: u8 = 0xc2;
/// Pop `k`, then `k` items and a needle; push whether the needle is among them.
pub const OP_ANYVALUE: u8 = 0xc3;

/// `OP_1`..`OP_16` for `n` in `1..=16`.
pub fn small_int(n: u8) -> Option<u8> {
    match n {
        0 => Some(OP_0),
        1..=16 => Some(OP_1 + n - 1),
        _ => None,
    }
}

/// Inverse of [`small_int`].
pub fn decode_small_int(op: u8) -> Option<u8> {
    match op {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some(op - OP_1 + 1),
        _ => None,
    }
}

/// Mnemonic for display.
pub fn name(op: u8) -> &'static str {
    match op {
        OP_0 => "OP_0",
        OP_1NEGATE => "OP_1NEGATE",
        OP_IF => "OP_IF",
        OP_NOTIF => "OP_NOTIF",
        OP_ELSE => "OP_ELSE",
        OP_ENDIF => "OP_ENDIF",
        OP_VERIFY => "OP_VERIFY",
        OP_DROP => "OP_DROP",
        OP_DUP => "OP_DUP",
        OP_SWAP => "OP_SWAP",
        OP_EQUAL => "OP_EQUAL",
        OP_EQUALVERIFY => "OP_EQUALVERIFY",
        OP_LESSTHANOREQUAL => "OP_LESSTHANOREQUAL",
        OP_HASH160 => "OP_HASH160",
        OP_CHECKSIG => "OP_CHECKSIG",
        OP_CHECKSIGVERIFY => "OP_CHECKSIGVERIFY",
        OP_CHECKMULTISIG => "OP_CHECKMULTISIG",
        OP_CHECKSEQUENCEVERIFY => "OP_CHECKSEQUENCEVERIFY",
        OP_OUTPUTAMOUNT => "OP_OUTPUTAMOUNT",
        OP_OUTPUTHASH => "OP_OUTPUTHASH",
        OP_OUTPUTCOUNT => "OP_OUTPUTCOUNT",
        OP_ANYVALUE => "OP_ANYVALUE",
        _ => "OP_UNKNOWN",
    }
}
