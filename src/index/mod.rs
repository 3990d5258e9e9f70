pub mod btree_index;
pub mod btree_page;

pub use btree_index::BPlusTree;
pub use btree_page::{BranchPage, LeafPage, Node, PageType, Record};
