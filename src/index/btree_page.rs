use bytes::{Buf, BufMut};

use crate::common::{BplusError, Key, PageId, Result, Value, PAGE_SIZE};

const BRANCH_TAG: u8 = 0;
const LEAF_TAG: u8 = 1;

const TAG_SIZE: usize = 1;
const COUNT_SIZE: usize = 4;
const KEY_SIZE: usize = 4;
const POINTER_SIZE: usize = 4;
const VALUE_LEN_SIZE: usize = 4;

/// Node kind, from the tag byte at the start of a branch or leaf page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Branch,
    Leaf,
}

impl PageType {
    pub fn of(page_id: PageId, data: &[u8]) -> Result<Self> {
        match data.first() {
            Some(&BRANCH_TAG) => Ok(PageType::Branch),
            Some(&LEAF_TAG) => Ok(PageType::Leaf),
            Some(&tag) => Err(BplusError::corrupt(
                page_id,
                format!("unknown page tag {:#04x}", tag),
            )),
            None => Err(BplusError::corrupt(page_id, "empty page buffer")),
        }
    }

    fn tag(self) -> u8 {
        match self {
            PageType::Branch => BRANCH_TAG,
            PageType::Leaf => LEAF_TAG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

impl Record {
    pub fn new(key: Key, value: impl Into<Value>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Internal node.
///
/// `pointers[0]` leads to keys below `keys[0]`, `pointers[i]` to keys in
/// `[keys[i-1], keys[i])` and the last pointer to keys at or above the last
/// key. A branch with no keys and no pointers is an empty root.
///
/// Layout: tag 0x00, key count K, K keys, pointer count K+1, K+1 page IDs,
/// every integer a little-endian u32.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchPage {
    pub keys: Vec<Key>,
    pub pointers: Vec<PageId>,
}

impl BranchPage {
    pub fn new(keys: Vec<Key>, pointers: Vec<PageId>) -> Self {
        Self { keys, pointers }
    }

    pub fn encoded_len(&self) -> usize {
        TAG_SIZE
            + COUNT_SIZE
            + self.keys.len() * KEY_SIZE
            + COUNT_SIZE
            + self.pointers.len() * POINTER_SIZE
    }

    /// Child to follow for `key`: the first pointer whose key is greater
    /// than `key`, or the last pointer when there is none.
    pub fn child_for(&self, key: Key) -> Option<PageId> {
        let index = self.keys.partition_point(|&k| k <= key);
        self.pointers.get(index).copied()
    }

    pub fn decode(page_id: PageId, data: &[u8]) -> Result<Self> {
        if PageType::of(page_id, data)? != PageType::Branch {
            return Err(BplusError::corrupt(page_id, "expected a branch page"));
        }
        let mut buf = &data[TAG_SIZE..];

        let key_count = read_count(page_id, &mut buf, KEY_SIZE, "key")?;
        let keys: Vec<Key> = (0..key_count).map(|_| buf.get_u32_le()).collect();

        let pointer_count = read_count(page_id, &mut buf, POINTER_SIZE, "pointer")?;
        let pointers = (0..pointer_count)
            .map(|_| PageId::new(buf.get_u32_le()))
            .collect();

        let branch = Self { keys, pointers };
        branch
            .check_shape()
            .map_err(|reason| BplusError::corrupt(page_id, reason))?;
        Ok(branch)
    }

    /// Clears `data` and writes the branch into it.
    pub fn encode(&self, data: &mut [u8]) -> Result<()> {
        self.check_shape().map_err(BplusError::MalformedNode)?;
        let needed = self.encoded_len();
        if needed > data.len() {
            return Err(BplusError::PageOverflow {
                needed,
                available: data.len(),
            });
        }

        data.fill(0);
        let mut buf = &mut data[..];
        buf.put_u8(PageType::Branch.tag());
        buf.put_u32_le(self.keys.len() as u32);
        for &key in &self.keys {
            buf.put_u32_le(key);
        }
        buf.put_u32_le(self.pointers.len() as u32);
        for pointer in &self.pointers {
            buf.put_u32_le(pointer.as_u32());
        }
        Ok(())
    }

    fn check_shape(&self) -> std::result::Result<(), String> {
        let empty_root = self.keys.is_empty() && self.pointers.is_empty();
        if !empty_root && self.pointers.len() != self.keys.len() + 1 {
            return Err(format!(
                "{} keys need {} pointers, found {}",
                self.keys.len(),
                self.keys.len() + 1,
                self.pointers.len()
            ));
        }
        check_ascending(&self.keys)
    }
}

/// Terminal node.
///
/// Layout: tag 0x01, record count N, then N records of key, value length L
/// and L value bytes. Integers are little-endian u32.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafPage {
    pub records: Vec<Record>,
}

impl LeafPage {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn encoded_len(&self) -> usize {
        TAG_SIZE
            + COUNT_SIZE
            + self
                .records
                .iter()
                .map(|r| KEY_SIZE + VALUE_LEN_SIZE + r.value.len())
                .sum::<usize>()
    }

    /// Linear scan for an exact key match.
    pub fn get(&self, key: Key) -> Option<&[u8]> {
        self.records
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.value.as_slice())
    }

    pub fn decode(page_id: PageId, data: &[u8]) -> Result<Self> {
        if PageType::of(page_id, data)? != PageType::Leaf {
            return Err(BplusError::corrupt(page_id, "expected a leaf page"));
        }
        let mut buf = &data[TAG_SIZE..];

        let record_count = read_count(page_id, &mut buf, KEY_SIZE + VALUE_LEN_SIZE, "record")?;
        let mut records = Vec::with_capacity(record_count);
        for i in 0..record_count {
            if buf.remaining() < KEY_SIZE + VALUE_LEN_SIZE {
                return Err(BplusError::corrupt(
                    page_id,
                    format!("record {} runs past the end of the page", i),
                ));
            }
            let key = buf.get_u32_le();
            let len = buf.get_u32_le() as usize;
            if buf.remaining() < len {
                return Err(BplusError::corrupt(
                    page_id,
                    format!("value of key {} runs past the end of the page", key),
                ));
            }
            let value = buf[..len].to_vec();
            buf.advance(len);
            records.push(Record { key, value });
        }

        let leaf = Self { records };
        leaf.check_keys()
            .map_err(|reason| BplusError::corrupt(page_id, reason))?;
        Ok(leaf)
    }

    /// Clears `data` and writes the leaf into it.
    pub fn encode(&self, data: &mut [u8]) -> Result<()> {
        self.check_keys().map_err(BplusError::MalformedNode)?;
        let needed = self.encoded_len();
        if needed > data.len() {
            return Err(BplusError::PageOverflow {
                needed,
                available: data.len(),
            });
        }

        data.fill(0);
        let mut buf = &mut data[..];
        buf.put_u8(PageType::Leaf.tag());
        buf.put_u32_le(self.records.len() as u32);
        for record in &self.records {
            buf.put_u32_le(record.key);
            buf.put_u32_le(record.value.len() as u32);
            buf.put_slice(&record.value);
        }
        Ok(())
    }

    fn check_keys(&self) -> std::result::Result<(), String> {
        let keys: Vec<Key> = self.records.iter().map(|r| r.key).collect();
        check_ascending(&keys)
    }
}

/// A decoded branch or leaf page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Branch(BranchPage),
    Leaf(LeafPage),
}

impl Node {
    pub fn decode(page_id: PageId, data: &[u8]) -> Result<Self> {
        match PageType::of(page_id, data)? {
            PageType::Branch => BranchPage::decode(page_id, data).map(Node::Branch),
            PageType::Leaf => LeafPage::decode(page_id, data).map(Node::Leaf),
        }
    }
}

/// Reads an element count and checks that `count` elements of at least
/// `min_size` bytes each fit in what is left of the page.
fn read_count(page_id: PageId, buf: &mut &[u8], min_size: usize, what: &str) -> Result<usize> {
    if buf.remaining() < COUNT_SIZE {
        return Err(BplusError::corrupt(
            page_id,
            format!("{} count runs past the end of the page", what),
        ));
    }
    let count = buf.get_u32_le() as usize;
    if count > PAGE_SIZE || count * min_size > buf.remaining() {
        return Err(BplusError::corrupt(
            page_id,
            format!("{} {}s do not fit in a page", count, what),
        ));
    }
    Ok(count)
}

fn check_ascending(keys: &[Key]) -> std::result::Result<(), String> {
    match keys.windows(2).find(|pair| pair[0] >= pair[1]) {
        Some(pair) => Err(format!(
            "keys must be strictly ascending, found {} before {}",
            pair[0], pair[1]
        )),
        None => Ok(()),
    }
}
