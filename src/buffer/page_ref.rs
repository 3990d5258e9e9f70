use crate::common::{PageId, Result};

use super::PageStore;

/// Handle to a page loaded into the page cache.
///
/// The handle names a page, not a cache slot: every access goes through the
/// store lock and finds the page's current slot. Once the page is released,
/// accesses fail with `PageNotLoaded` until it is loaded again.
#[derive(Clone, Copy)]
pub struct PageRef<'a> {
    store: &'a PageStore,
    page_id: PageId,
}

impl<'a> PageRef<'a> {
    pub(crate) fn new(store: &'a PageStore, page_id: PageId) -> Self {
        Self { store, page_id }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn is_resident(&self) -> bool {
        self.store.is_resident(self.page_id)
    }

    /// Runs `f` over the page bytes. `f` must not call back into the store.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        self.store.with_page(self.page_id, f)
    }

    /// Runs `f` over the mutable page bytes. Changes reach disk only through
    /// `PageStore::write`. `f` must not call back into the store.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        self.store.with_page_mut(self.page_id, f)
    }
}
