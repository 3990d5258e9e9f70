use bytes::{Buf, BufMut};

use crate::common::{PageId, PAGE_SIZE};

const NEXT_FREE_OFFSET: usize = 0;

/// Largest page whose byte offset still fits the 32-bit free-list links.
pub const MAX_PAGE_ID: PageId = PageId(u32::MAX / PAGE_SIZE as u32);

/// Overlay of a page that has been handed back to the allocator.
///
/// Recycled pages form a singly linked list rooted at the header; each one
/// stores the byte offset of the next (0 terminates the list) and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreePage {
    pub next_free_page: u32,
}

impl FreePage {
    pub fn decode(data: &[u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self {
            next_free_page: (&data[NEXT_FREE_OFFSET..]).get_u32_le(),
        }
    }

    /// Clears the page and writes the link.
    pub fn encode(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        data.fill(0);
        (&mut data[NEXT_FREE_OFFSET..]).put_u32_le(self.next_free_page);
    }
}

/// Byte offset used to link `page_id` into the free list.
pub fn free_list_offset(page_id: PageId) -> Option<u32> {
    page_id.as_u32().checked_mul(PAGE_SIZE as u32)
}
