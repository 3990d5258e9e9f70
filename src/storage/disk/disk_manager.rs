use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::trace;

use crate::common::{BplusError, PageId, Result, PAGE_SIZE};

/// DiskManager moves whole pages between memory and the backing file.
///
/// It does no locking of its own: the page store owns it inside its
/// critical section, so every method takes `&mut self`.
pub struct DiskManager {
    /// The backing file
    file: File,
    /// Number of page reads performed
    num_reads: u64,
    /// Number of page writes performed
    num_writes: u64,
}

impl DiskManager {
    /// Opens the file at `path`, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        Ok(Self {
            file,
            num_reads: 0,
            num_writes: 0,
        })
    }

    /// Reads a page from disk into the provided buffer.
    ///
    /// A page that starts at or past the end of the file has been allocated
    /// but never written; the buffer is zero-filled and the read succeeds.
    /// A page cut off part way through fails with `PageNotFullyRead`.
    pub fn read_page(&mut self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        self.file.seek(SeekFrom::Start(page_id.offset()))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            match self.file.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.num_reads += 1;

        match filled {
            0 => {
                trace!(page = page_id.as_u32(), "read past end of file, zero-filling");
                data.fill(0);
                Ok(())
            }
            PAGE_SIZE => {
                trace!(page = page_id.as_u32(), "read page");
                Ok(())
            }
            _ => Err(BplusError::PageNotFullyRead(page_id)),
        }
    }

    /// Writes a page to disk from the provided buffer.
    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        self.file.seek(SeekFrom::Start(page_id.offset()))?;
        match self.file.write_all(data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WriteZero => {
                return Err(BplusError::PageNotFullyWritten(page_id));
            }
            Err(e) => return Err(e.into()),
        }
        self.file.flush()?;

        self.num_writes += 1;
        trace!(page = page_id.as_u32(), "wrote page");
        Ok(())
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u64 {
        self.num_reads
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u64 {
        self.num_writes
    }

    /// Flushes file contents and metadata to the device.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.file.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_manager_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut dm = DiskManager::open(temp_file.path()).unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        write_data[PAGE_SIZE - 1] = 128;
        dm.write_page(PageId::new(3), &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(3), &mut read_data).unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
        assert_eq!(read_data[PAGE_SIZE - 1], 128);
        assert_eq!(dm.num_reads(), 1);
        assert_eq!(dm.num_writes(), 1);
    }

    #[test]
    fn test_disk_manager_read_past_end_zero_fills() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut dm = DiskManager::open(temp_file.path()).unwrap();

        let mut data = [0xAAu8; PAGE_SIZE];
        dm.read_page(PageId::new(7), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disk_manager_hole_reads_as_zeros() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut dm = DiskManager::open(temp_file.path()).unwrap();

        // Writing page 2 leaves page 1 as a hole inside the file
        dm.write_page(PageId::new(2), &[9u8; PAGE_SIZE]).unwrap();

        let mut data = [0xAAu8; PAGE_SIZE];
        dm.read_page(PageId::new(1), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disk_manager_truncated_page() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), [1u8; 100]).unwrap();
        let mut dm = DiskManager::open(temp_file.path()).unwrap();

        let mut data = [0u8; PAGE_SIZE];
        let err = dm.read_page(PageId::new(0), &mut data).unwrap_err();
        assert!(matches!(err, BplusError::PageNotFullyRead(PageId(0))));
    }

    #[test]
    fn test_disk_manager_persistence() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let mut dm = DiskManager::open(&path).unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 123;
            dm.write_page(PageId::new(0), &data).unwrap();
        }

        {
            let mut dm = DiskManager::open(&path).unwrap();
            let mut data = [0u8; PAGE_SIZE];
            dm.read_page(PageId::new(0), &mut data).unwrap();
            assert_eq!(data[0], 123);
        }
    }
}
