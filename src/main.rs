use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bplus::index::{BPlusTree, BranchPage, LeafPage, Record};
use bplus::common::{DEFAULT_BRANCHING_FACTOR, DEFAULT_CACHE_CAPACITY};
use bplus::{BplusError, PageId};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let db_path = std::env::args().nth(1).unwrap_or_else(|| "demo.db".to_string());
    if let Err(e) = run(&db_path) {
        error!("demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(db_path: &str) -> bplus::Result<()> {
    println!("Bplus - a disk-backed B+ tree");
    println!("=============================\n");

    let tree = BPlusTree::new(db_path, DEFAULT_BRANCHING_FACTOR, DEFAULT_CACHE_CAPACITY)?;
    let store = tree.store();
    info!(path = db_path, root = tree.root_page_id().as_u32(), "opened tree");

    //          20
    //        /    \
    //     10        30
    //    /  \      /  \
    //  [5] [10] [20] [30, 40]
    let leaves = [
        vec![Record::new(5, b"five".to_vec())],
        vec![Record::new(10, b"ten".to_vec())],
        vec![Record::new(20, b"twenty".to_vec())],
        vec![
            Record::new(30, b"thirty".to_vec()),
            Record::new(40, b"forty".to_vec()),
        ],
    ];
    let mut leaf_ids = Vec::with_capacity(leaves.len());
    for records in leaves {
        let page_id = store.allocate()?;
        let page = store.load(page_id)?;
        page.write(|data| LeafPage::new(records).encode(data))??;
        store.write(page_id)?;
        store.release(page_id)?;
        leaf_ids.push(page_id);
    }

    let left = write_branch(&tree, vec![10], vec![leaf_ids[0], leaf_ids[1]])?;
    let right = write_branch(&tree, vec![30], vec![leaf_ids[2], leaf_ids[3]])?;

    let root_id = tree.root_page_id();
    let root = store.load(root_id)?;
    root.write(|data| BranchPage::new(vec![20], vec![left, right]).encode(data))??;
    store.write(root_id)?;

    println!("Pages allocated: {}", store.size());
    for key in [5, 10, 20, 30, 40, 50] {
        match tree.read(key) {
            Ok(value) => println!("  {:>3} -> {}", key, String::from_utf8_lossy(&value)),
            Err(BplusError::KeyNotFound) => println!("  {:>3} -> (not found)", key),
            Err(e) => return Err(e),
        }
    }

    store.sync()?;
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}

fn write_branch(tree: &BPlusTree, keys: Vec<u32>, pointers: Vec<PageId>) -> bplus::Result<PageId> {
    let store = tree.store();
    let page_id = store.allocate()?;
    let page = store.load(page_id)?;
    page.write(|data| BranchPage::new(keys, pointers).encode(data))??;
    store.write(page_id)?;
    store.release(page_id)?;
    Ok(page_id)
}
