//! Bplus - a disk-backed page store with a B+ tree index
//!
//! A single file is divided into fixed 4 KB pages. Page 0 is a header that
//! identifies the file and roots an on-disk list of recycled pages; every
//! other page is handed out by the store's allocator and cached in a fixed
//! number of in-memory slots.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page I/O and on-disk formats
//!   - `DiskManager`: reads and writes whole pages against the backing file
//!   - `HeaderPage`, `FreePage`: codecs for page 0 and recycled pages
//!
//! - **Buffer** (`buffer`): the page cache and allocator
//!   - `PageStore`: load, write, release, allocate and free pages
//!   - `FreeList`: ring buffer of unused cache slots
//!   - `PageRef`: handle to a cached page; reads and writes run under the store lock
//!
//! - **Index** (`index`): B+ tree
//!   - `BranchPage`, `LeafPage`: tagged node codecs
//!   - `BPlusTree`: point lookups by descent from the root
//!
//! The cache never evicts on its own. When every slot is in use, loads fail
//! with `CacheFull` until the caller releases a page.
//!
//! # Example
//!
//! ```rust,no_run
//! use bplus::index::{BPlusTree, BranchPage, LeafPage, Record};
//!
//! let tree = BPlusTree::new("tree.db", 4, 16).unwrap();
//! let store = tree.store();
//!
//! // Lay out a one-leaf tree by hand
//! let leaf_id = store.allocate().unwrap();
//! let leaf = store.load(leaf_id).unwrap();
//! leaf.write(|data| LeafPage::new(vec![Record::new(1, b"one".to_vec())]).encode(data))
//!     .unwrap()
//!     .unwrap();
//! store.write(leaf_id).unwrap();
//!
//! let root = store.load(tree.root_page_id()).unwrap();
//! root.write(|data| BranchPage::new(vec![1], vec![leaf_id, leaf_id]).encode(data))
//!     .unwrap()
//!     .unwrap();
//! store.write(tree.root_page_id()).unwrap();
//!
//! assert_eq!(tree.read(1).unwrap(), b"one");
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use buffer::PageStore;
pub use common::{BplusError, Key, PageId, Result, Value};
pub use index::BPlusTree;
