//! Slotted page layout for variable-length records.
//!
//! A page owns one fixed-size [`ByteBuffer`] and interprets it as:
//!
//! ```text
//! [0, 12)                      header: block_id, free_space_offset, slot_count
//! [12, 12 + 8 * slot_count)    slot directory, grows toward higher offsets
//! [.., free_space_offset)      free gap
//! [free_space_offset, cap)     record data, grows toward lower offsets
//! ```
//!
//! Records are addressed by [`SlotId`]. Deletion is two-phase: `tombstone`
//! marks a record dead without moving bytes, `reclaim` compacts the data
//! region and frees the slot for reuse.
//!
//! # Example
//!
//! ```
//! use common::BlockId;
//! use storage::{InsertOutcome, SlottedPage};
//!
//! let mut page = SlottedPage::new(1024, BlockId(1)).unwrap();
//! let InsertOutcome::Inserted(slot) = page.insert(b"hello, world!").unwrap() else {
//!     panic!("empty page has room");
//! };
//! assert_eq!(page.read(slot).unwrap(), b"hello, world!");
//! assert_eq!(page.space_available().unwrap(), 991);
//!
//! page.tombstone(slot).unwrap();
//! page.reclaim(slot).unwrap();
//! assert_eq!(page.space_available().unwrap(), 1012);
//! ```

#[cfg(test)]
mod tests;

pub mod layout;
pub mod page;
pub mod slot;

pub use bytebuf::ByteBuffer;
pub use common::{BlockId, SlotId};
pub use layout::{HEADER_SIZE, PageHeader, SLOT_SIZE};
pub use page::{InsertOutcome, PageStats, SlottedPage};
pub use slot::{SlotInfo, SlotState};
