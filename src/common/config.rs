use super::types::{PageId, SlotId};

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Marks a file as a page store. Stored little-endian, so the first four
/// bytes of the file read "EKAJ".
pub const MAGIC_NUMBER: u32 = 0x4A41_4B45;

/// The header page always lives at the start of the file.
pub const HEADER_PAGE_ID: PageId = PageId(0);

/// The header page is pinned to the first cache slot.
pub const HEADER_SLOT: SlotId = SlotId(0);

/// Default number of cache slots, header slot included
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Default B+ tree fan-out
pub const DEFAULT_BRANCHING_FACTOR: usize = 128;

/// Smallest fan-out a B+ tree can be built with
pub const MIN_BRANCHING_FACTOR: usize = 3;

/// Smallest usable cache: the header slot plus one slot for data pages
pub const MIN_CACHE_CAPACITY: usize = 2;
