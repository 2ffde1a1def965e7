//! Slot directory entry states.

use common::SlotId;
use serde::Serialize;
use std::cmp::Ordering;

/// State of one directory entry.
///
/// On the page this is a single signed size: `0` for empty, the record
/// length for a live record, the negated length for a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "len", rename_all = "snake_case")]
pub enum SlotState {
    Empty,
    Live(u32),
    Tombstoned(u32),
}

impl SlotState {
    pub fn from_raw(raw: i32) -> Self {
        match raw.cmp(&0) {
            Ordering::Equal => Self::Empty,
            Ordering::Greater => Self::Live(raw.unsigned_abs()),
            Ordering::Less => Self::Tombstoned(raw.unsigned_abs()),
        }
    }

    /// Signed encoding. Lengths never exceed the page capacity, which is
    /// bounded by `i32::MAX`.
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Empty => 0,
            Self::Live(len) => len as i32,
            Self::Tombstoned(len) => -(len as i32),
        }
    }

    /// Bytes the record occupies in the data region, tombstoned or not.
    pub fn len(self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Live(len) | Self::Tombstoned(len) => len as usize,
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn is_tombstoned(self) -> bool {
        matches!(self, Self::Tombstoned(_))
    }

    /// The state after a tombstone is applied; tombstones and empty slots
    /// are unchanged.
    pub fn tombstoned(self) -> Self {
        match self {
            Self::Live(len) => Self::Tombstoned(len),
            other => other,
        }
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub slot: SlotId,
    pub offset: usize,
    pub state: SlotState,
}
