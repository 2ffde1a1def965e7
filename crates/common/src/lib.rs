
pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{fmt, io};
use thiserror::Error;

/// Opaque identifier of a page, stored verbatim in the page header.
/// Examples:
/// - `let heap_page = BlockId(0);`
/// - `let overflow_page = BlockId(42);`
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockId(pub i32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of an entry in a page's slot directory.
/// Examples:
/// - `let first = SlotId(0);`
/// - `let reused = SlotId(3);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical error type shared across the page subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("buffer: {0}")]
    Buffer(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Smallest page that can hold the fixed header.
pub const MIN_PAGE_SIZE: usize = 12;

/// Construction parameters for a slotted page.
///
/// # Example
/// ```
/// use common::{BlockId, PageConfig};
///
/// let config = PageConfig::builder()
///     .page_size(1024)
///     .block_id(BlockId(7))
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct PageConfig {
    /// Fixed page capacity in bytes, header included.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Identifier written into the header at construction.
    #[builder(default)]
    pub block_id: BlockId,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            block_id: BlockId(0),
        }
    }
}

impl PageConfig {
    /// Checks that `page_size` fits the header and the 4-byte offset fields.
    pub fn validate(&self) -> DbResult<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(DbError::Config(format!(
                "page size {} is smaller than the {MIN_PAGE_SIZE}-byte header",
                self.page_size
            )));
        }
        if self.page_size > i32::MAX as usize {
            return Err(DbError::Config(format!(
                "page size {} exceeds the addressable offset range",
                self.page_size
            )));
        }
        Ok(())
    }
}
