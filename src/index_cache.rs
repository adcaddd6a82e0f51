use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::trace;

use crate::error::{DecodeError, ReadError};
use crate::header::SubFileParameter;
use crate::source::ByteSource;

/// Number of index entries grouped into one cached page.
pub const INDEX_ENTRIES_PER_PAGE: u64 = 128;

const BITMASK_INDEX_OFFSET: u64 = 0x7f_ffff_ffff;
const BITMASK_INDEX_WATER: u64 = 0x80_0000_0000;

/// One decoded block index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// The block is entirely covered by water.
    pub is_water: bool,
    /// Offset of the block, relative to the start of its sub-file.
    pub block_offset: u64,
}

impl IndexEntry {
    /// Decodes a 5-byte big-endian index entry: the top bit is the water
    /// flag, the low 39 bits are the block offset.
    fn from_bytes(bytes: &[u8; 5]) -> IndexEntry {
        let mut raw = 0u64;
        for byte in bytes {
            raw = (raw << 8) | u64::from(*byte);
        }
        IndexEntry {
            is_water: raw & BITMASK_INDEX_WATER != 0,
            block_offset: raw & BITMASK_INDEX_OFFSET,
        }
    }
}

type Page = Arc<Vec<IndexEntry>>;

// Per-page slot. The outer map hands out the slot under its own short
// lock; the slot mutex then serializes the page load, so concurrent
// requests for the same page trigger exactly one read.
type PageSlot = Arc<Mutex<Option<Page>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PageKey {
    sub_file_id: usize,
    page_number: u64,
}

/// LRU cache of block index pages, shared by all queries on a reader.
pub struct IndexCache {
    pages: Mutex<LruCache<PageKey, PageSlot>>,
}

impl IndexCache {
    pub fn new(capacity: usize) -> IndexCache {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        IndexCache {
            pages: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the index entry for `block_number`, loading and caching its
    /// page on a miss. Load failures are returned to the caller and never
    /// cached, so a transient read error does not poison the page.
    pub fn get_index_entry(
        &self,
        sub_file: &SubFileParameter,
        source: &dyn ByteSource,
        block_number: u64,
    ) -> Result<IndexEntry, ReadError> {
        if block_number >= sub_file.number_of_blocks as u64 {
            return Err(ReadError::Decode(DecodeError::InvalidValue {
                field: "block number",
                value: block_number as i64,
            }));
        }

        let key = PageKey {
            sub_file_id: sub_file.id,
            page_number: block_number / INDEX_ENTRIES_PER_PAGE,
        };
        let slot = {
            let mut pages = self.pages.lock().expect("index cache lock poisoned");
            pages.get_or_insert(key, PageSlot::default).clone()
        };

        let mut loaded = slot.lock().expect("index page lock poisoned");
        let page = match &*loaded {
            Some(page) => page.clone(),
            None => {
                let page = Arc::new(load_page(sub_file, source, key.page_number)?);
                *loaded = Some(page.clone());
                page
            }
        };

        let entry_number = (block_number % INDEX_ENTRIES_PER_PAGE) as usize;
        page.get(entry_number).copied().ok_or_else(|| {
            ReadError::Decode(DecodeError::InvalidValue {
                field: "index entry number",
                value: entry_number as i64,
            })
        })
    }
}

/// Reads and decodes one index page. The final page of a sub-file may be
/// shorter than a full page.
fn load_page(
    sub_file: &SubFileParameter,
    source: &dyn ByteSource,
    page_number: u64,
) -> Result<Vec<IndexEntry>, ReadError> {
    let page_bytes = INDEX_ENTRIES_PER_PAGE * SubFileParameter::BYTES_PER_INDEX_ENTRY;
    let page_start = sub_file.index_start_address + page_number * page_bytes;
    let page_end = (page_start + page_bytes).min(sub_file.index_end_address);
    let length = (page_end - page_start) as usize;

    trace!(
        sub_file = sub_file.id,
        page_number, page_start, length, "loading index page"
    );

    let mut buffer = vec![0u8; length];
    source.read_at(page_start, &mut buffer)?;

    let entries = buffer
        .chunks_exact(SubFileParameter::BYTES_PER_INDEX_ENTRY as usize)
        .map(|chunk| {
            let mut bytes = [0u8; 5];
            bytes.copy_from_slice(chunk);
            IndexEntry::from_bytes(&bytes)
        })
        .collect();
    Ok(entries)
}
