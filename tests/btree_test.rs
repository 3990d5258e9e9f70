//! Integration tests for B+ tree lookups over hand-built trees

use std::sync::Arc;
use std::thread;

use bplus::buffer::PageStore;
use bplus::common::{BplusError, PageId};
use bplus::index::{BPlusTree, BranchPage, LeafPage, Record};
use tempfile::NamedTempFile;

fn create_tree(branching_factor: usize, cache_capacity: usize) -> (BPlusTree, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let tree = BPlusTree::new(temp_file.path(), branching_factor, cache_capacity).unwrap();
    (tree, temp_file)
}

fn write_leaf(store: &PageStore, page_id: PageId, keys: &[u32]) {
    let records = keys.iter().map(|&k| Record::new(k, vec![k as u8])).collect();
    let page = store.load(page_id).unwrap();
    page.write(|data| LeafPage::new(records).encode(data))
        .unwrap()
        .unwrap();
    store.write(page_id).unwrap();
}

fn write_branch(store: &PageStore, page_id: PageId, keys: Vec<u32>, pointers: Vec<u32>) {
    let pointers = pointers.into_iter().map(PageId::new).collect();
    let page = store.load(page_id).unwrap();
    page.write(|data| BranchPage::new(keys, pointers).encode(data))
        .unwrap()
        .unwrap();
    store.write(page_id).unwrap();
}

/// Lays out this tree, root at page 1:
///
/// ```text
///                      7
///            /                  \
///         3, 5                   9
///    /      |      \         /       \
///  1, 2    3, 4    5, 6    7, 8     9, 10
/// ```
fn build_two_level_tree(tree: &BPlusTree) {
    let store = tree.store();
    for _ in 0..7 {
        store.allocate().unwrap();
    }

    write_leaf(store, PageId::new(2), &[1, 2]);
    write_leaf(store, PageId::new(3), &[3, 4]);
    write_leaf(store, PageId::new(4), &[5, 6]);
    write_leaf(store, PageId::new(5), &[7, 8]);
    write_leaf(store, PageId::new(6), &[9, 10]);

    write_branch(store, PageId::new(7), vec![3, 5], vec![2, 3, 4]);
    write_branch(store, PageId::new(8), vec![9], vec![5, 6]);

    write_branch(store, tree.root_page_id(), vec![7], vec![7, 8]);
}

#[test]
fn test_empty_tree_read() {
    let (tree, _temp) = create_tree(4, 20);
    assert!(matches!(tree.read(0), Err(BplusError::KeyNotFound)));
    assert!(matches!(tree.read(42), Err(BplusError::KeyNotFound)));
}

#[test]
fn test_two_level_tree_lookup() {
    let (tree, _temp) = create_tree(4, 20);
    assert_eq!(tree.root_page_id(), PageId::new(1));
    build_two_level_tree(&tree);

    for key in 1..=10u32 {
        let value = tree.read(key).unwrap();
        assert_eq!(value[0] as u32, key, "wrong value for key {}", key);
    }

    assert!(matches!(tree.read(0), Err(BplusError::KeyNotFound)));
    assert!(matches!(tree.read(11), Err(BplusError::KeyNotFound)));
}

#[test]
fn test_lookup_after_reopen() {
    let temp_file = NamedTempFile::new().unwrap();
    let root = {
        let tree = BPlusTree::new(temp_file.path(), 4, 20).unwrap();
        build_two_level_tree(&tree);
        tree.root_page_id()
    };

    // A small cache: the header, the root and the two pages below it
    let store = PageStore::open(temp_file.path(), 4).unwrap();
    let tree = BPlusTree::open(store, root, 4).unwrap();
    assert_eq!(tree.read(6).unwrap(), vec![6]);

    // The pages from the first lookup are still resident
    assert!(matches!(tree.read(9), Err(BplusError::CacheFull)));
    tree.store().release(PageId::new(7)).unwrap();
    tree.store().release(PageId::new(4)).unwrap();
    assert_eq!(tree.read(9).unwrap(), vec![9]);
}

#[test]
fn test_open_rejects_bad_root() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = PageStore::open(temp_file.path(), 4).unwrap();
    assert!(matches!(
        BPlusTree::open(store, PageId::new(5), 4),
        Err(BplusError::InvalidPageId(_))
    ));
}

#[test]
fn test_insert_and_delete_are_not_implemented() {
    let (mut tree, temp) = create_tree(4, 20);
    build_two_level_tree(&tree);

    let before = std::fs::read(temp.path()).unwrap();
    let writes = tree.store().num_writes();
    let size = tree.store().size();

    assert!(matches!(
        tree.insert(11, b"eleven"),
        Err(BplusError::NotImplemented("insert"))
    ));
    assert!(matches!(
        tree.delete(3),
        Err(BplusError::NotImplemented("delete"))
    ));

    assert_eq!(std::fs::read(temp.path()).unwrap(), before);
    assert_eq!(tree.store().num_writes(), writes);
    assert_eq!(tree.store().size(), size);
    assert_eq!(tree.read(3).unwrap(), vec![3]);
}

#[test]
fn test_concurrent_readers() {
    let (tree, _temp) = create_tree(4, 20);
    build_two_level_tree(&tree);
    let tree = Arc::new(tree);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for _ in 0..100 {
                    for key in 1..=10u32 {
                        assert_eq!(tree.read(key).unwrap(), vec![key as u8]);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_allocations_while_reading() {
    let (tree, _temp) = create_tree(4, 20);
    build_two_level_tree(&tree);
    let tree = Arc::new(tree);

    let reader = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            for _ in 0..200 {
                assert_eq!(tree.read(8).unwrap(), vec![8]);
            }
        })
    };
    for _ in 0..200 {
        tree.store().allocate().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(tree.store().size(), 209);
}

#[test]
fn test_lookups_while_pages_are_released_and_reloaded() {
    let (tree, _temp) = create_tree(4, 20);
    build_two_level_tree(&tree);
    let tree = Arc::new(tree);

    let churn = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            let store = tree.store();
            for _ in 0..500 {
                for id in 2..=8 {
                    // A lookup may have just reloaded the page
                    let _ = store.release(PageId::new(id));
                    store.load(PageId::new(id)).unwrap();
                }
            }
        })
    };

    for _ in 0..500 {
        for key in 1..=10u32 {
            assert_eq!(tree.read(key).unwrap(), vec![key as u8]);
        }
    }
    churn.join().unwrap();
}
