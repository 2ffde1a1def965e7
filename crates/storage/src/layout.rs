//! Byte layout of the page header and slot directory.
//!
//! All fields are 4-byte little-endian signed integers:
//!
//! ```text
//! offset 0      block_id
//! offset 4      free_space_offset
//! offset 8      slot_count
//! offset 12+8k  slot[k].offset
//! offset 16+8k  slot[k].size
//! ```

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{DbError, DbResult, SlotId};
use serde::{Deserialize, Serialize};

pub const BLOCK_ID_OFFSET: usize = 0;
pub const FREE_SPACE_OFFSET: usize = 4;
pub const SLOT_COUNT_OFFSET: usize = 8;

/// Width of the fixed header.
pub const HEADER_SIZE: usize = size_of::<PageHeader>();

/// Width of one slot directory entry (offset + size).
pub const SLOT_SIZE: usize = 2 * size_of::<i32>();

const _: () = assert!(HEADER_SIZE == 12);

fn bincode_config() -> impl Config {
    config::legacy()
}

/// Decoded copy of the header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHeader {
    pub block_id: i32,
    pub free_space_offset: i32,
    pub slot_count: i32,
}

impl PageHeader {
    pub fn decode(bytes: &[u8]) -> DbResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(DbError::Storage(format!(
                "page header needs {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let (header, read) = decode_from_slice(&bytes[..HEADER_SIZE], bincode_config())
            .map_err(|e| DbError::Storage(format!("read page header failed: {e}")))?;
        debug_assert_eq!(read, HEADER_SIZE);
        Ok(header)
    }

    pub fn encode(&self) -> DbResult<[u8; HEADER_SIZE]> {
        let mut out = [0u8; HEADER_SIZE];
        let written = encode_into_slice(self, &mut out, bincode_config())
            .map_err(|e| DbError::Storage(format!("write page header failed: {e}")))?;
        debug_assert_eq!(written, HEADER_SIZE);
        Ok(out)
    }
}

/// Position of the `offset` field of `slot`'s directory entry.
pub fn slot_offset_field(slot: SlotId) -> usize {
    HEADER_SIZE + slot.index() * SLOT_SIZE
}

/// Position of the `size` field of `slot`'s directory entry.
pub fn slot_size_field(slot: SlotId) -> usize {
    slot_offset_field(slot) + size_of::<i32>()
}

/// First byte past a directory of `slot_count` entries.
pub fn directory_end(slot_count: u32) -> usize {
    HEADER_SIZE + slot_count as usize * SLOT_SIZE
}
