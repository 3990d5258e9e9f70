use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::common::{
    BplusError, PageId, Result, SlotId, HEADER_PAGE_ID, HEADER_SLOT, MIN_CACHE_CAPACITY,
    PAGE_SIZE,
};
use crate::storage::disk::DiskManager;
use crate::storage::page::{free_list_offset, FreePage, HeaderPage, MAX_PAGE_ID};

use super::{Frame, FreeList, PageRef};

/// Everything the store lock guards
struct StoreState {
    /// The backing file
    disk: DiskManager,
    /// The cache slots
    frames: Vec<Frame>,
    /// Page table: maps resident page IDs to cache slots
    lookup: HashMap<PageId, SlotId>,
    /// Cache slots that hold no page
    free_slots: FreeList<SlotId>,
    /// Decoded copy of the header held in slot 0
    header: HeaderPage,
}

/// PageStore is a paged file with a fixed-capacity page cache and an
/// allocator that recycles freed pages through an on-disk free list.
///
/// Page 0 is the header and stays in slot 0 for the lifetime of the store.
/// When every slot is taken, loads fail with `CacheFull`; nothing is ever
/// evicted behind the caller's back.
///
/// The file, the cache slots and all bookkeeping sit behind one lock, and
/// page bytes are only reached through closures run while holding it.
pub struct PageStore {
    state: Mutex<StoreState>,
    /// Number of cache slots
    cache_capacity: usize,
    /// Path to the backing file
    path: PathBuf,
}

impl PageStore {
    /// Opens the page store at `path`, initializing the file if it does not
    /// carry the magic number yet.
    pub fn open<P: AsRef<Path>>(path: P, cache_capacity: usize) -> Result<Self> {
        if cache_capacity < MIN_CACHE_CAPACITY {
            return Err(BplusError::InvalidConfig(format!(
                "cache capacity must be at least {}, got {}",
                MIN_CACHE_CAPACITY, cache_capacity
            )));
        }
        let slot_count = u32::try_from(cache_capacity).map_err(|_| {
            BplusError::InvalidConfig(format!("cache capacity {} is too large", cache_capacity))
        })?;

        let mut disk = DiskManager::open(path.as_ref())?;
        let mut frames: Vec<_> = (0..slot_count).map(|_| Frame::new()).collect();

        let header_frame = &mut frames[HEADER_SLOT.as_usize()];
        disk.read_page(HEADER_PAGE_ID, header_frame.data_mut())?;
        header_frame.set_page_id(Some(HEADER_PAGE_ID));
        let mut header = HeaderPage::decode(header_frame.data());

        if !header.is_valid() {
            header = HeaderPage::initialized();
            header.encode(header_frame.data_mut());
            disk.write_page(HEADER_PAGE_ID, header_frame.data())?;
            debug!(path = %path.as_ref().display(), "initialized new page store");
        } else {
            debug!(
                path = %path.as_ref().display(),
                size = header.size,
                free_list = header.free_list,
                "opened existing page store"
            );
        }

        let mut lookup = HashMap::with_capacity(cache_capacity);
        lookup.insert(HEADER_PAGE_ID, HEADER_SLOT);

        let mut free_slots = FreeList::new(cache_capacity);
        for i in 1..slot_count {
            free_slots.enqueue(SlotId::new(i))?;
        }

        Ok(Self {
            state: Mutex::new(StoreState {
                disk,
                frames,
                lookup,
                free_slots,
                header,
            }),
            cache_capacity,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Brings a page into the cache and returns a handle to it.
    /// A page that is already resident is returned without any I/O.
    pub fn load(&self, page_id: PageId) -> Result<PageRef<'_>> {
        self.state.lock().load(page_id)?;
        Ok(PageRef::new(self, page_id))
    }

    /// Loads a page if needed and runs `f` over its bytes, all under one
    /// acquisition of the store lock.
    pub fn load_with<R>(&self, page_id: PageId, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let mut state = self.state.lock();
        let slot = state.load(page_id)?;
        Ok(f(state.frames[slot.as_usize()].data()))
    }

    /// Runs `f` over the bytes of a resident page.
    pub fn with_page<R>(&self, page_id: PageId, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let state = self.state.lock();
        let slot = state.slot_of(page_id)?;
        Ok(f(state.frames[slot.as_usize()].data()))
    }

    /// Runs `f` over the mutable bytes of a resident page.
    pub fn with_page_mut<R>(&self, page_id: PageId, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut state = self.state.lock();
        let slot = state.slot_of(page_id)?;
        Ok(f(state.frames[slot.as_usize()].data_mut()))
    }

    /// Writes a resident page's buffer to its place in the file.
    pub fn write(&self, page_id: PageId) -> Result<()> {
        self.state.lock().write(page_id)
    }

    /// Drops a page from the cache, making its slot available again.
    /// Unwritten changes to the page are discarded.
    pub fn release(&self, page_id: PageId) -> Result<()> {
        if page_id == HEADER_PAGE_ID {
            return Err(BplusError::HeaderPage);
        }

        let mut state = self.state.lock();
        let slot = state
            .lookup
            .remove(&page_id)
            .ok_or(BplusError::PageNotLoaded(page_id))?;
        debug_assert_eq!(state.frames[slot.as_usize()].page_id(), Some(page_id));
        state.frames[slot.as_usize()].reset();
        state.free_slots.enqueue(slot)?;

        trace!(page = page_id.as_u32(), slot = slot.as_u32(), "released page");
        Ok(())
    }

    /// Hands out a page, reusing the most recently freed one if there is
    /// one and growing the file otherwise.
    pub fn allocate(&self) -> Result<PageId> {
        let mut state = self.state.lock();
        if state.header.free_list != 0 {
            state.allocate_from_free_list()
        } else {
            state.allocate_from_end_of_file()
        }
    }

    /// Returns a page to the allocator. The page is cleared, linked in front
    /// of the current free list and written out before the header is.
    pub fn free(&self, page_id: PageId) -> Result<()> {
        if page_id == HEADER_PAGE_ID {
            return Err(BplusError::HeaderPage);
        }

        let mut state = self.state.lock();
        if page_id.as_u32() >= state.header.size {
            return Err(BplusError::InvalidPageId(page_id));
        }
        let link = free_list_offset(page_id).ok_or(BplusError::InvalidPageId(page_id))?;

        let free = FreePage {
            next_free_page: state.header.free_list,
        };
        let slot = state.load(page_id)?;
        free.encode(state.frames[slot.as_usize()].data_mut());
        state.write(page_id)?;

        let header = HeaderPage {
            free_list: link,
            ..state.header
        };
        state.persist_header(header)?;

        debug!(page = page_id.as_u32(), next = free.next_free_page, "freed page");
        Ok(())
    }

    /// Number of pages ever allocated, header included.
    pub fn size(&self) -> u32 {
        self.state.lock().header.size
    }

    /// The page the next allocation will reuse, if any.
    pub fn free_list_head(&self) -> Option<PageId> {
        self.state.lock().header.free_list_head()
    }

    pub fn magic(&self) -> u32 {
        self.state.lock().header.magic
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().lookup.contains_key(&page_id)
    }

    /// Number of cache slots, the header slot included.
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    /// Number of cache slots not holding a page.
    pub fn free_slot_count(&self) -> usize {
        self.state.lock().free_slots.len()
    }

    /// Number of page reads issued against the file.
    pub fn num_reads(&self) -> u64 {
        self.state.lock().disk.num_reads()
    }

    /// Number of page writes issued against the file.
    pub fn num_writes(&self) -> u64 {
        self.state.lock().disk.num_writes()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the backing file to the device.
    pub fn sync(&self) -> Result<()> {
        self.state.lock().disk.sync()
    }
}

impl StoreState {
    fn slot_of(&self, page_id: PageId) -> Result<SlotId> {
        self.lookup
            .get(&page_id)
            .copied()
            .ok_or(BplusError::PageNotLoaded(page_id))
    }

    fn load(&mut self, page_id: PageId) -> Result<SlotId> {
        if let Some(&slot) = self.lookup.get(&page_id) {
            trace!(page = page_id.as_u32(), slot = slot.as_u32(), "cache hit");
            return Ok(slot);
        }

        let slot = match self.free_slots.dequeue() {
            Ok(slot) => slot,
            Err(BplusError::FreeListEmpty) => {
                warn!(page = page_id.as_u32(), "page cache is full");
                return Err(BplusError::CacheFull);
            }
            Err(e) => return Err(e),
        };

        let frame = &mut self.frames[slot.as_usize()];
        if let Err(e) = self.disk.read_page(page_id, frame.data_mut()) {
            frame.reset();
            self.free_slots.enqueue(slot)?;
            return Err(e);
        }
        frame.set_page_id(Some(page_id));
        self.lookup.insert(page_id, slot);

        trace!(page = page_id.as_u32(), slot = slot.as_u32(), "cache miss, loaded page");
        Ok(slot)
    }

    fn write(&mut self, page_id: PageId) -> Result<()> {
        let slot = self.slot_of(page_id)?;
        self.disk
            .write_page(page_id, self.frames[slot.as_usize()].data())
    }

    /// Encodes `header` into slot 0 and writes it out. The in-memory header
    /// only changes once the write has succeeded.
    fn persist_header(&mut self, header: HeaderPage) -> Result<()> {
        header.encode(self.frames[HEADER_SLOT.as_usize()].data_mut());
        if let Err(e) = self.write(HEADER_PAGE_ID) {
            let previous = self.header;
            previous.encode(self.frames[HEADER_SLOT.as_usize()].data_mut());
            return Err(e);
        }
        self.header = header;
        Ok(())
    }

    fn allocate_from_free_list(&mut self) -> Result<PageId> {
        assert!(
            self.header.free_list != 0,
            "allocate_from_free_list called with an empty free list"
        );

        let offset = self.header.free_list;
        let page_id = PageId::new(offset / PAGE_SIZE as u32);
        if offset % PAGE_SIZE as u32 != 0
            || page_id == HEADER_PAGE_ID
            || page_id.as_u32() >= self.header.size
        {
            return Err(BplusError::corrupt(
                HEADER_PAGE_ID,
                format!("free list points at byte offset {}", offset),
            ));
        }

        let slot = self.load(page_id)?;
        let free = FreePage::decode(self.frames[slot.as_usize()].data());

        let header = HeaderPage {
            free_list: free.next_free_page,
            ..self.header
        };
        self.persist_header(header)?;

        debug!(page = page_id.as_u32(), "allocated page from free list");
        Ok(page_id)
    }

    fn allocate_from_end_of_file(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.header.size);
        if page_id > MAX_PAGE_ID {
            return Err(BplusError::InvalidPageId(page_id));
        }

        let header = HeaderPage {
            size: self.header.size + 1,
            ..self.header
        };
        self.persist_header(header)?;

        debug!(page = page_id.as_u32(), "allocated page at end of file");
        Ok(page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MAGIC_NUMBER;
    use tempfile::NamedTempFile;

    fn create_store(cache_capacity: usize) -> (PageStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = PageStore::open(temp_file.path(), cache_capacity).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_page_store_new() {
        let (store, temp) = create_store(10);
        assert_eq!(store.cache_capacity(), 10);
        assert_eq!(store.free_slot_count(), 9);
        assert_eq!(store.magic(), MAGIC_NUMBER);
        assert_eq!(store.size(), 1);
        assert_eq!(store.free_list_head(), None);
        assert!(store.is_resident(HEADER_PAGE_ID));
        assert_eq!(store.path(), temp.path());
    }

    #[test]
    fn test_page_store_rejects_tiny_cache() {
        let temp_file = NamedTempFile::new().unwrap();
        assert!(matches!(
            PageStore::open(temp_file.path(), 1),
            Err(BplusError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_page_store_cache_hit_does_no_io() {
        let (store, _temp) = create_store(4);
        let page_id = store.allocate().unwrap();

        store.load(page_id).unwrap();
        let reads = store.num_reads();
        store.load(page_id).unwrap();
        store.load_with(page_id, |data| data[0]).unwrap();
        assert_eq!(store.num_reads(), reads);
        assert_eq!(store.free_slot_count(), 2);
    }

    #[test]
    fn test_page_store_write_requires_resident_page() {
        let (store, _temp) = create_store(4);
        let page_id = store.allocate().unwrap();
        assert!(matches!(
            store.write(page_id),
            Err(BplusError::PageNotLoaded(id)) if id == page_id
        ));
        assert!(matches!(
            store.release(page_id),
            Err(BplusError::PageNotLoaded(_))
        ));
        assert!(matches!(
            store.with_page(page_id, |_| ()),
            Err(BplusError::PageNotLoaded(_))
        ));
        assert!(matches!(
            store.with_page_mut(page_id, |_| ()),
            Err(BplusError::PageNotLoaded(_))
        ));
    }

    #[test]
    fn test_page_store_header_is_pinned() {
        let (store, _temp) = create_store(4);
        assert!(matches!(store.release(HEADER_PAGE_ID), Err(BplusError::HeaderPage)));
        assert!(matches!(store.free(HEADER_PAGE_ID), Err(BplusError::HeaderPage)));
        assert!(store.is_resident(HEADER_PAGE_ID));
    }

    #[test]
    fn test_page_store_free_unallocated_page() {
        let (store, _temp) = create_store(4);
        assert!(matches!(
            store.free(PageId::new(1)),
            Err(BplusError::InvalidPageId(PageId(1)))
        ));
    }

    #[test]
    fn test_page_store_failed_load_returns_slot() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let store = PageStore::open(temp_file.path(), 4).unwrap();
            store.allocate().unwrap();
        }
        // Leave a partial page 1 behind the header
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(temp_file.path())
            .unwrap();
        file.set_len(PAGE_SIZE as u64 + 10).unwrap();

        let store = PageStore::open(temp_file.path(), 4).unwrap();
        assert!(matches!(
            store.load(PageId::new(1)),
            Err(BplusError::PageNotFullyRead(PageId(1)))
        ));
        assert_eq!(store.free_slot_count(), 3);
        assert!(!store.is_resident(PageId::new(1)));
    }

    #[test]
    fn test_page_store_corrupt_free_list_pointer() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let store = PageStore::open(temp_file.path(), 4).unwrap();
            // Point the free list past the end of the store
            store
                .with_page_mut(HEADER_PAGE_ID, |data| {
                    data[4..8].copy_from_slice(&(40 * PAGE_SIZE as u32).to_le_bytes())
                })
                .unwrap();
            store.write(HEADER_PAGE_ID).unwrap();
        }

        let store = PageStore::open(temp_file.path(), 4).unwrap();
        assert!(matches!(
            store.allocate(),
            Err(BplusError::CorruptPage { page_id: PageId(0), .. })
        ));
    }
}
