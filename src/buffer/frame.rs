use crate::common::{PageId, PAGE_SIZE};

/// Frame is one slot of the page cache: the page buffer plus the ID of the
/// page currently held in it. Frames live inside the page store's lock.
pub(crate) struct Frame {
    /// The page held in this slot, None while the slot is free
    page_id: Option<PageId>,
    /// The page bytes
    data: Box<[u8; PAGE_SIZE]>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page_id: None,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    pub fn set_page_id(&mut self, page_id: Option<PageId>) {
        self.page_id = page_id;
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Empties the slot.
    pub fn reset(&mut self) {
        self.page_id = None;
        self.data.fill(0);
    }
}
