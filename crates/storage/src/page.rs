//! The slotted page and its mutation algorithms.

use bytebuf::ByteBuffer;
use common::{BlockId, DbError, DbResult, PageConfig, SlotId};
use serde::Serialize;
use tracing::{debug, trace};

use crate::layout::{
    BLOCK_ID_OFFSET, FREE_SPACE_OFFSET, HEADER_SIZE, PageHeader, SLOT_COUNT_OFFSET, SLOT_SIZE,
    directory_end, slot_offset_field, slot_size_field,
};
use crate::slot::{SlotInfo, SlotState};

/// Result of an insertion attempt. Running out of room is not an error;
/// the caller decides whether to try another page.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(SlotId),
    PageFull,
}

impl InsertOutcome {
    pub fn slot(self) -> Option<SlotId> {
        match self {
            Self::Inserted(slot) => Some(slot),
            Self::PageFull => None,
        }
    }

    pub fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Occupancy summary of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub block_id: BlockId,
    pub capacity: usize,
    pub slot_count: u32,
    pub live_slots: u32,
    pub tombstoned_slots: u32,
    pub empty_slots: u32,
    /// Bytes held by live records.
    pub live_bytes: usize,
    /// Bytes held by tombstoned records that `reclaim` would free.
    pub dead_bytes: usize,
    pub free_space_offset: usize,
    pub space_available: usize,
}

/// A single page of variable-length records.
///
/// The page exclusively owns its buffer. Every public operation leaves the
/// layout invariants intact:
///
/// - `12 + 8 * slot_count <= free_space_offset <= capacity`
/// - every non-empty slot lies inside `[free_space_offset, capacity)`
/// - the byte ranges of non-empty slots are pairwise disjoint
///
/// Reclaimed slots stay in the directory as zeroed holes and are reused
/// lowest-id first, so the id of a live record never changes. Reclaiming
/// the last directory entry also trims any holes left at the end of the
/// directory; reclaiming any other entry leaves `slot_count` unchanged.
#[derive(Debug, Clone)]
pub struct SlottedPage {
    buffer: ByteBuffer,
}

impl SlottedPage {
    /// Create an empty page of `capacity` bytes.
    pub fn new(capacity: usize, block_id: BlockId) -> DbResult<Self> {
        let config = PageConfig::builder()
            .page_size(capacity)
            .block_id(block_id)
            .build();
        Self::with_config(&config)
    }

    pub fn with_config(config: &PageConfig) -> DbResult<Self> {
        config.validate()?;
        let mut page = Self {
            buffer: ByteBuffer::new(config.page_size),
        };
        page.write_header(&PageHeader {
            block_id: config.block_id.0,
            free_space_offset: config.page_size as i32,
            slot_count: 0,
        })?;
        Ok(page)
    }

    /// Adopt a page image previously obtained from [`SlottedPage::buffer`].
    ///
    /// # Errors
    ///
    /// Returns `DbError::Storage` if the image is too small or violates any
    /// layout invariant.
    pub fn from_bytes(bytes: &[u8]) -> DbResult<Self> {
        Self::from_buffer(ByteBuffer::from_bytes(bytes))
    }

    pub fn from_buffer(buffer: ByteBuffer) -> DbResult<Self> {
        let capacity = buffer.size();
        if capacity < HEADER_SIZE || capacity > i32::MAX as usize {
            return Err(DbError::Storage(format!(
                "page image of {capacity} bytes has an invalid size"
            )));
        }
        let page = Self { buffer };
        page.validate()?;
        debug!(
            capacity,
            slot_count = page.slot_count()?,
            "adopted page image"
        );
        Ok(page)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.size()
    }

    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> ByteBuffer {
        self.buffer
    }

    pub fn header(&self) -> DbResult<PageHeader> {
        PageHeader::decode(self.buffer.read_bytes(0, HEADER_SIZE)?)
    }

    fn write_header(&mut self, header: &PageHeader) -> DbResult<()> {
        self.buffer.write_bytes(0, &header.encode()?)
    }

    pub fn block_id(&self) -> DbResult<BlockId> {
        Ok(BlockId(self.buffer.read_i32(BLOCK_ID_OFFSET)?))
    }

    pub fn set_block_id(&mut self, block_id: BlockId) -> DbResult<()> {
        self.buffer.write_i32(BLOCK_ID_OFFSET, block_id.0)
    }

    /// Number of directory entries, holes and tombstones included.
    pub fn slot_count(&self) -> DbResult<u32> {
        let raw = self.buffer.read_i32(SLOT_COUNT_OFFSET)?;
        u32::try_from(raw).map_err(|_| DbError::Storage(format!("negative slot count {raw}")))
    }

    fn write_slot_count(&mut self, count: u32) -> DbResult<()> {
        self.buffer.write_i32(SLOT_COUNT_OFFSET, count as i32)
    }

    /// Start of the data region.
    pub fn free_space_offset(&self) -> DbResult<usize> {
        let raw = self.buffer.read_i32(FREE_SPACE_OFFSET)?;
        to_offset(raw, "free space offset")
    }

    fn write_free_space_offset(&mut self, offset: usize) -> DbResult<()> {
        self.buffer.write_i32(FREE_SPACE_OFFSET, offset as i32)
    }

    fn read_slot_offset_at(&self, slot: SlotId) -> DbResult<usize> {
        let raw = self.buffer.read_i32(slot_offset_field(slot))?;
        to_offset(raw, "slot offset")
    }

    fn write_slot_offset_at(&mut self, slot: SlotId, offset: usize) -> DbResult<()> {
        self.buffer.write_i32(slot_offset_field(slot), offset as i32)
    }

    fn read_slot_state_at(&self, slot: SlotId) -> DbResult<SlotState> {
        Ok(SlotState::from_raw(
            self.buffer.read_i32(slot_size_field(slot))?,
        ))
    }

    fn write_slot_state_at(&mut self, slot: SlotId, state: SlotState) -> DbResult<()> {
        self.buffer.write_i32(slot_size_field(slot), state.to_raw())
    }

    /// Bytes between the end of the slot directory and the data region.
    pub fn space_available(&self) -> DbResult<usize> {
        let directory_end = directory_end(self.slot_count()?);
        let free = self.free_space_offset()?;
        free.checked_sub(directory_end).ok_or_else(|| {
            DbError::Storage(format!(
                "slot directory ends at {directory_end}, past free space offset {free}"
            ))
        })
    }

    /// Whether a record of `len` bytes plus one directory entry fits.
    pub fn can_fit(&self, len: usize) -> DbResult<bool> {
        let Some(needed) = len.checked_add(SLOT_SIZE) else {
            return Ok(false);
        };
        Ok(self.space_available()? >= needed)
    }

    /// Lowest empty slot id, or `slot_count` when the directory has no holes.
    pub fn first_free_slot(&self) -> DbResult<SlotId> {
        let count = self.slot_count()?;
        for id in 0..count {
            if self.read_slot_state_at(SlotId(id))?.is_empty() {
                return Ok(SlotId(id));
            }
        }
        Ok(SlotId(count))
    }

    pub fn slot_state(&self, slot: SlotId) -> DbResult<SlotState> {
        self.check_in_directory(slot)?;
        self.read_slot_state_at(slot)
    }

    /// Copy `record` into the page.
    ///
    /// The record is placed just below the current data region and takes the
    /// lowest empty slot, appending a new directory entry if there is none.
    /// A full page yields `InsertOutcome::PageFull` and leaves the page
    /// untouched.
    ///
    /// # Errors
    ///
    /// Zero-length records are rejected: their directory entry would be
    /// indistinguishable from an empty slot.
    pub fn insert(&mut self, record: &[u8]) -> DbResult<InsertOutcome> {
        if record.is_empty() {
            return Err(DbError::Storage("cannot store a zero-length record".into()));
        }
        if !self.can_fit(record.len())? {
            debug!(
                len = record.len(),
                available = self.space_available()?,
                "page full, insert refused"
            );
            return Ok(InsertOutcome::PageFull);
        }

        let slot = self.first_free_slot()?;
        let offset = self.free_space_offset()? - record.len();
        self.write_free_space_offset(offset)?;
        self.buffer.write_bytes(offset, record)?;

        let count = self.slot_count()?;
        if slot.0 == count {
            self.write_slot_count(count + 1)?;
        }
        self.write_slot_offset_at(slot, offset)?;
        self.write_slot_state_at(slot, SlotState::Live(record.len() as u32))?;

        trace!(%slot, len = record.len(), offset, "inserted record");
        Ok(InsertOutcome::Inserted(slot))
    }

    /// Borrow the bytes of a live record.
    pub fn read(&self, slot: SlotId) -> DbResult<&[u8]> {
        match self.slot_state(slot)? {
            SlotState::Live(len) => {
                let offset = self.read_slot_offset_at(slot)?;
                self.buffer.read_bytes(offset, len as usize)
            }
            SlotState::Tombstoned(_) => {
                Err(DbError::Storage(format!("slot {slot} is tombstoned")))
            }
            SlotState::Empty => Err(DbError::Storage(format!("slot {slot} is empty"))),
        }
    }

    /// Mark a record deleted without moving any bytes. Tombstoning an
    /// already tombstoned slot does nothing.
    pub fn tombstone(&mut self, slot: SlotId) -> DbResult<()> {
        let state = self.occupied_state(slot)?;
        if state.is_live() {
            self.write_slot_state_at(slot, state.tombstoned())?;
            trace!(%slot, len = state.len(), "tombstoned record");
        }
        Ok(())
    }

    /// Remove a record's bytes and compact the data region.
    ///
    /// Records stored below the removed one (inserted after it) slide up by
    /// its length and their directory offsets are rewritten. The slot becomes
    /// an empty hole; if it was the last directory entry, trailing holes are
    /// trimmed from the directory.
    pub fn reclaim(&mut self, slot: SlotId) -> DbResult<()> {
        let len = self.occupied_state(slot)?.len();
        let offset = self.read_slot_offset_at(slot)?;
        let free = self.free_space_offset()?;
        let shifted = offset.checked_sub(free).ok_or_else(|| {
            DbError::Storage(format!(
                "slot {slot} offset {offset} lies before free space offset {free}"
            ))
        })?;

        self.buffer.copy(free, free + len, shifted)?;
        self.write_free_space_offset(free + len)?;
        self.write_slot_offset_at(slot, 0)?;
        self.write_slot_state_at(slot, SlotState::Empty)?;

        let count = self.slot_count()?;
        for id in (0..count).map(SlotId) {
            if self.read_slot_state_at(id)?.is_empty() {
                continue;
            }
            let other = self.read_slot_offset_at(id)?;
            if other < offset {
                self.write_slot_offset_at(id, other + len)?;
            }
        }

        if slot.0 + 1 == count {
            self.trim_directory_tail()?;
        }

        trace!(%slot, len, free_space_offset = free + len, "reclaimed record");
        Ok(())
    }

    /// Reclaim every tombstoned record, returning how many were removed.
    pub fn vacuum(&mut self) -> DbResult<usize> {
        let tombstoned: Vec<SlotId> = self
            .slots()?
            .into_iter()
            .filter(|info| info.state.is_tombstoned())
            .map(|info| info.slot)
            .collect();

        for &slot in tombstoned.iter().rev() {
            self.reclaim(slot)?;
        }
        if !tombstoned.is_empty() {
            debug!(reclaimed = tombstoned.len(), "vacuumed page");
        }
        Ok(tombstoned.len())
    }

    /// Live records in slot order.
    pub fn live_records(&self) -> DbResult<Vec<(SlotId, &[u8])>> {
        let mut records = Vec::new();
        for id in (0..self.slot_count()?).map(SlotId) {
            if let SlotState::Live(len) = self.read_slot_state_at(id)? {
                let offset = self.read_slot_offset_at(id)?;
                records.push((id, self.buffer.read_bytes(offset, len as usize)?));
            }
        }
        Ok(records)
    }

    /// Every directory entry in slot order.
    pub fn slots(&self) -> DbResult<Vec<SlotInfo>> {
        (0..self.slot_count()?)
            .map(SlotId)
            .map(|slot| {
                let state = self.read_slot_state_at(slot)?;
                // The offset field of an empty slot carries no meaning.
                let offset = if state.is_empty() {
                    0
                } else {
                    self.read_slot_offset_at(slot)?
                };
                Ok(SlotInfo {
                    slot,
                    offset,
                    state,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> DbResult<PageStats> {
        let mut stats = PageStats {
            block_id: self.block_id()?,
            capacity: self.capacity(),
            slot_count: self.slot_count()?,
            live_slots: 0,
            tombstoned_slots: 0,
            empty_slots: 0,
            live_bytes: 0,
            dead_bytes: 0,
            free_space_offset: self.free_space_offset()?,
            space_available: self.space_available()?,
        };
        for info in self.slots()? {
            match info.state {
                SlotState::Live(len) => {
                    stats.live_slots += 1;
                    stats.live_bytes += len as usize;
                }
                SlotState::Tombstoned(len) => {
                    stats.tombstoned_slots += 1;
                    stats.dead_bytes += len as usize;
                }
                SlotState::Empty => stats.empty_slots += 1,
            }
        }
        Ok(stats)
    }

    /// Check every layout invariant against the current bytes.
    pub fn validate(&self) -> DbResult<()> {
        let capacity = self.capacity();
        let header = self.header()?;
        let slot_count = u32::try_from(header.slot_count).map_err(|_| {
            DbError::Storage(format!("negative slot count {}", header.slot_count))
        })?;
        let free = to_offset(header.free_space_offset, "free space offset")?;
        let directory_end = directory_end(slot_count);

        if directory_end > free || free > capacity {
            return Err(DbError::Storage(format!(
                "free space offset {free} outside [{directory_end}, {capacity}]"
            )));
        }

        let mut ranges = Vec::with_capacity(slot_count as usize);
        for slot in (0..slot_count).map(SlotId) {
            let state = self.read_slot_state_at(slot)?;
            if state.is_empty() {
                continue;
            }
            let start = self.read_slot_offset_at(slot)?;
            let end = start.checked_add(state.len()).unwrap_or(usize::MAX);
            if start < free || end > capacity {
                return Err(DbError::Storage(format!(
                    "slot {slot} spans {start}..{end}, outside data region {free}..{capacity}"
                )));
            }
            ranges.push((start, end, slot));
        }

        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            let (_, prev_end, prev_slot) = pair[0];
            let (next_start, _, next_slot) = pair[1];
            if next_start < prev_end {
                return Err(DbError::Storage(format!(
                    "slots {prev_slot} and {next_slot} overlap"
                )));
            }
        }
        Ok(())
    }

    fn check_in_directory(&self, slot: SlotId) -> DbResult<()> {
        let count = self.slot_count()?;
        if slot.0 >= count {
            return Err(DbError::Storage(format!(
                "invalid slot {slot}, page has {count} slots"
            )));
        }
        Ok(())
    }

    fn occupied_state(&self, slot: SlotId) -> DbResult<SlotState> {
        let state = self.slot_state(slot)?;
        if state.is_empty() {
            return Err(DbError::Storage(format!("slot {slot} is empty")));
        }
        Ok(state)
    }

    fn trim_directory_tail(&mut self) -> DbResult<()> {
        let before = self.slot_count()?;
        let mut count = before;
        while count > 0 && self.read_slot_state_at(SlotId(count - 1))?.is_empty() {
            count -= 1;
        }
        if count != before {
            self.write_slot_count(count)?;
            debug!(from = before, to = count, "trimmed slot directory");
        }
        Ok(())
    }
}

fn to_offset(raw: i32, what: &str) -> DbResult<usize> {
    usize::try_from(raw).map_err(|_| DbError::Storage(format!("negative {what} {raw}")))
}
