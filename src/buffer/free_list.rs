use crate::common::{BplusError, Result};

/// Fixed-capacity FIFO ring buffer of identifiers.
///
/// The page store keeps its unused cache slots here. Neither operation ever
/// grows the buffer; a failed call leaves the list untouched.
#[derive(Debug)]
pub struct FreeList<T> {
    buf: Box<[T]>,
    front: usize,
    back: usize,
    len: usize,
}

impl<T: Copy + Default> FreeList<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![T::default(); capacity].into_boxed_slice(),
            front: 0,
            back: 0,
            len: 0,
        }
    }

    /// Appends `id` at the back.
    pub fn enqueue(&mut self, id: T) -> Result<()> {
        if self.len == self.buf.len() {
            return Err(BplusError::FreeListFull);
        }
        self.buf[self.back] = id;
        self.back = (self.back + 1) % self.buf.len();
        self.len += 1;
        Ok(())
    }

    /// Removes the identifier at the front.
    pub fn dequeue(&mut self) -> Result<T> {
        if self.len == 0 {
            return Err(BplusError::FreeListEmpty);
        }
        let id = self.buf[self.front];
        self.front = (self.front + 1) % self.buf.len();
        self.len -= 1;
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}
