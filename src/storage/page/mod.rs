mod free_page;
mod header_page;

pub use free_page::*;
pub use header_page::*;
