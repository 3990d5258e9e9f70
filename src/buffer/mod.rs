mod frame;
mod free_list;
mod page_ref;
mod page_store;

pub(crate) use frame::Frame;
pub use free_list::*;
pub use page_ref::*;
pub use page_store::*;
