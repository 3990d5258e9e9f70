use bytes::{Buf, BufMut};

use crate::common::{PageId, MAGIC_NUMBER, PAGE_SIZE};

const MAGIC_OFFSET: usize = 0;
const FREE_LIST_OFFSET: usize = 4;
const SIZE_OFFSET: usize = 8;

/// Decoded contents of page 0.
///
/// Layout (little-endian):
/// - [0:4]  magic number
/// - [4:8]  byte offset of the first recycled page, 0 when the free list is empty
/// - [8:12] number of pages ever allocated, header included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPage {
    pub magic: u32,
    pub free_list: u32,
    pub size: u32,
}

impl HeaderPage {
    /// Header of a file that has just been claimed as a page store.
    pub fn initialized() -> Self {
        Self {
            magic: MAGIC_NUMBER,
            free_list: 0,
            size: 1,
        }
    }

    pub fn decode(data: &[u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self {
            magic: (&data[MAGIC_OFFSET..]).get_u32_le(),
            free_list: (&data[FREE_LIST_OFFSET..]).get_u32_le(),
            size: (&data[SIZE_OFFSET..]).get_u32_le(),
        }
    }

    /// Writes the three header fields, leaving the rest of the page alone.
    pub fn encode(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        (&mut data[MAGIC_OFFSET..]).put_u32_le(self.magic);
        (&mut data[FREE_LIST_OFFSET..]).put_u32_le(self.free_list);
        (&mut data[SIZE_OFFSET..]).put_u32_le(self.size);
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC_NUMBER
    }

    /// The most recently freed page, if any.
    pub fn free_list_head(&self) -> Option<PageId> {
        if self.free_list == 0 {
            None
        } else {
            Some(PageId::new(self.free_list / PAGE_SIZE as u32))
        }
    }
}
