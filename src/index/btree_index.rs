use std::path::Path;

use tracing::{debug, trace};

use crate::buffer::PageStore;
use crate::common::{BplusError, Key, PageId, Result, Value, HEADER_PAGE_ID, MIN_BRANCHING_FACTOR};

use super::btree_page::{BranchPage, Node};

/// A B+ tree over a page store.
///
/// Only point lookups are supported; the tree is laid out by whoever writes
/// its pages. The root page stays resident in the cache.
pub struct BPlusTree {
    store: PageStore,
    root_page_id: PageId,
    branching_factor: usize,
}

impl BPlusTree {
    /// Opens the page store at `path` and allocates an empty root for a new tree.
    pub fn new<P: AsRef<Path>>(
        path: P,
        branching_factor: usize,
        cache_capacity: usize,
    ) -> Result<Self> {
        check_branching_factor(branching_factor)?;
        let store = PageStore::open(path, cache_capacity)?;

        let root_page_id = store.allocate()?;
        let root = store.load(root_page_id)?;
        root.write(|data| BranchPage::default().encode(data))??;
        store.write(root_page_id)?;

        debug!(root = root_page_id.as_u32(), branching_factor, "created tree");
        Ok(Self {
            store,
            root_page_id,
            branching_factor,
        })
    }

    /// Attaches to a tree whose root already lives in `store`.
    pub fn open(store: PageStore, root_page_id: PageId, branching_factor: usize) -> Result<Self> {
        check_branching_factor(branching_factor)?;
        if root_page_id == HEADER_PAGE_ID || root_page_id.as_u32() >= store.size() {
            return Err(BplusError::InvalidPageId(root_page_id));
        }

        store.load_with(root_page_id, |data| Node::decode(root_page_id, data))??;

        debug!(root = root_page_id.as_u32(), branching_factor, "opened tree");
        Ok(Self {
            store,
            root_page_id,
            branching_factor,
        })
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn branching_factor(&self) -> usize {
        self.branching_factor
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Looks up `key`, descending one page per level from the root.
    ///
    /// Each page is loaded and decoded under one store call. Levels are
    /// separate calls, so a concurrent allocate or free can land between two
    /// levels of the same lookup.
    pub fn read(&self, key: Key) -> Result<Value> {
        let mut page_id = self.root_page_id;

        // A well-formed tree never visits more pages than the store holds.
        for _ in 0..self.store.size() {
            let node = self
                .store
                .load_with(page_id, |data| Node::decode(page_id, data))??;
            trace!(page = page_id.as_u32(), key, "descending");

            match node {
                Node::Leaf(leaf) => {
                    return leaf
                        .get(key)
                        .map(|value| value.to_vec())
                        .ok_or(BplusError::KeyNotFound);
                }
                Node::Branch(branch) if page_id == self.root_page_id && branch.keys.is_empty() => {
                    return Err(BplusError::KeyNotFound);
                }
                Node::Branch(branch) => {
                    // Below the root, a branch with no keys routes every key
                    // to its only pointer.
                    let child = branch
                        .child_for(key)
                        .ok_or_else(|| BplusError::corrupt(page_id, "branch has no pointers"))?;
                    if child == HEADER_PAGE_ID {
                        return Err(BplusError::corrupt(page_id, "branch points at the header page"));
                    }
                    page_id = child;
                }
            }
        }

        Err(BplusError::corrupt(
            page_id,
            "descent did not reach a leaf; the tree has a cycle",
        ))
    }

    pub fn insert(&mut self, _key: Key, _value: &[u8]) -> Result<()> {
        Err(BplusError::NotImplemented("insert"))
    }

    pub fn delete(&mut self, _key: Key) -> Result<()> {
        Err(BplusError::NotImplemented("delete"))
    }
}

fn check_branching_factor(branching_factor: usize) -> Result<()> {
    if branching_factor < MIN_BRANCHING_FACTOR {
        return Err(BplusError::InvalidConfig(format!(
            "branching factor must be at least {}, got {}",
            MIN_BRANCHING_FACTOR, branching_factor
        )));
    }
    Ok(())
}
