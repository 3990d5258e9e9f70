use thiserror::Error;

use super::types::PageId;

/// Errors produced by the page store and the B+ tree
#[derive(Error, Debug)]
pub enum BplusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Page cache is full, release a page before loading another")]
    CacheFull,

    #[error("{0} is not loaded in the page cache")]
    PageNotLoaded(PageId),

    #[error("{0} was not fully read")]
    PageNotFullyRead(PageId),

    #[error("{0} was not fully written")]
    PageNotFullyWritten(PageId),

    #[error("Free list is full")]
    FreeListFull,

    #[error("Free list is empty")]
    FreeListEmpty,

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("The header page cannot be released or freed")]
    HeaderPage,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("{page_id} is corrupted: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Malformed node: {0}")]
    MalformedNode(String),

    #[error("Page overflow: content needs {needed} bytes but a page holds {available}")]
    PageOverflow { needed: usize, available: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BplusError {
    pub(crate) fn corrupt(page_id: PageId, reason: impl Into<String>) -> Self {
        BplusError::CorruptPage {
            page_id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BplusError>;
