//! Key slot lookup for node-targeted cluster commands.
//!
//! The client library routes keyed commands on its own. The harness only
//! needs a slot when it pins a keyless command (PING, INFO, a raw command
//! with a routing key) to the primary that owns a given key.

use memchr::memchr;

/// Number of hash slots in a cluster.
pub const SLOT_COUNT: u16 = 16384;

/// CRC16-XMODEM (poly 0x1021, init 0), bit by bit.
fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        (0..8).fold(crc ^ (u16::from(byte) << 8), |crc, _| {
            if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            }
        })
    })
}

/// The part of `key` that is hashed: the first non-empty `{tag}`, or the whole key.
fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = memchr(b'{', key) {
        let rest = &key[open + 1..];
        if let Some(close) = memchr(b'}', rest) {
            if close > 0 {
                return &rest[..close];
            }
        }
    }
    key
}

/// Slot owning `key`.
pub fn key_slot(key: &[u8]) -> u16 {
    crc16(hash_tag(key)) % SLOT_COUNT
}

// ── Tests ──────────────────────────────────────────────────────────
