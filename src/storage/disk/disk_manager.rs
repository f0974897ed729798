use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
    sync::atomic::{AtomicU32, AtomicUsize, Ordering},
};

use log::debug;
use parking_lot::Mutex;

use crate::common::config::{PageId, PAGE_SIZE};

/// DiskManager takes care of the allocation and deallocation of pages within a
/// database. It performs the reading and writing of pages to and from disk,
/// providing a logical file layer within the context of a database management
/// system.
///
/// All operations are synchronous and atomic at page granularity.
pub struct DiskManager {
    // Stream to write log file
    log_io: Mutex<File>,
    // Stream to write db file
    // Protects file access with multiple buffer pool instances
    db_io: Mutex<File>,
    // Next page id to hand out; monotonic, ids are never reused
    next_page_id: AtomicU32,
    // Number of log flushes
    num_flushes: AtomicUsize,
    // Number of page writes
    num_writes: AtomicUsize,
    // Number of deallocation calls
    num_deallocs: AtomicUsize,
}

impl DiskManager {
    /// Creates a new disk manager that writes to the specified database file
    /// and a sibling ".log" file. Reopening an existing file resumes the page
    /// id sequence past the pages already on disk.
    pub fn new(db_file: impl AsRef<Path>) -> io::Result<DiskManager> {
        let db_file = db_file.as_ref();
        let log_name = db_file.with_extension("log");

        let log_io = Self::open_or_create(&log_name)?;
        let db_io = Self::open_or_create(db_file)?;
        let next_page_id = db_io.metadata()?.len() / PAGE_SIZE as u64;

        Ok(Self {
            log_io: Mutex::new(log_io),
            db_io: Mutex::new(db_io),
            next_page_id: AtomicU32::new(next_page_id as PageId),
            num_flushes: AtomicUsize::new(0),
            num_writes: AtomicUsize::new(0),
            num_deallocs: AtomicUsize::new(0),
        })
    }

    fn open_or_create(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(path)
            })
    }

    /// Write a page to the database file.
    pub fn write_page(&self, page_id: PageId, page_data: &[u8; PAGE_SIZE]) -> io::Result<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.num_writes.fetch_add(1, Ordering::Relaxed);

        let mut db_io = self.db_io.lock();
        db_io.seek(SeekFrom::Start(offset))?;
        db_io.write_all(page_data)?;
        // needs to flush to keep disk file in sync
        db_io.flush()?;
        Ok(())
    }

    /// Read a page from the database file. Reading a page that was never
    /// written yields zeroed bytes.
    pub fn read_page(&self, page_id: PageId, page_data: &mut [u8; PAGE_SIZE]) -> io::Result<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut db_io = self.db_io.lock();
        if offset >= db_io.metadata()?.len() {
            page_data.fill(0);
            return Ok(());
        }
        db_io.seek(SeekFrom::Start(offset))?;
        let read_count = db_io.read(page_data)?;
        // if file ends before reading PAGE_SIZE
        if read_count < PAGE_SIZE {
            debug!("Read less than a page");
            // fill the rest of the buffer with 0
            page_data[read_count..].fill(0);
        }
        Ok(())
    }

    /// Allocate a page on disk and return its id.
    pub fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Deallocate a page on disk. Idempotent; this is a no-op right now
    /// without a more complex data structure to track deallocated pages.
    pub fn deallocate_page(&self, _page_id: PageId) {
        self.num_deallocs.fetch_add(1, Ordering::Relaxed);
    }

    /// Write the contents of the log into the disk file.
    /// Only returns when the sync is done, and only performs sequential writes.
    pub fn write_log(&self, log_data: &[u8]) -> io::Result<()> {
        if log_data.is_empty() {
            // no effect on num_flushes if log buffer is empty
            return Ok(());
        }

        self.num_flushes.fetch_add(1, Ordering::Relaxed);

        let mut log_io = self.log_io.lock();
        log_io.seek(SeekFrom::End(0))?;
        log_io.write_all(log_data)?;
        // needs to flush to keep disk file in sync
        log_io.flush()?;
        Ok(())
    }

    /// Read the contents of the log into the given memory area, starting at
    /// `offset`. Returns Ok(false) once the offset reaches the end of the log.
    pub fn read_log(&self, log_data: &mut [u8], offset: u64) -> io::Result<bool> {
        let mut log_io = self.log_io.lock();
        if offset >= log_io.metadata()?.len() {
            debug!("Read past end of log file");
            return Ok(false);
        }
        log_io.seek(SeekFrom::Start(offset))?;
        let read_count = log_io.read(log_data)?;
        if read_count < log_data.len() {
            log_data[read_count..].fill(0);
        }
        Ok(true)
    }

    /// Returns the number of log flushes.
    pub fn num_flushes(&self) -> usize {
        self.num_flushes.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes.
    pub fn num_writes(&self) -> usize {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of deallocation calls.
    pub fn num_deallocs(&self) -> usize {
        self.num_deallocs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::common::config::PAGE_SIZE;

    #[test]
    fn read_write_page() {
        let mut buf = [0; PAGE_SIZE];
        let mut data = [0; PAGE_SIZE];

        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = DiskManager::new(&db_file).unwrap();
        let test_str = b"A test string.";
        data[..test_str.len()].copy_from_slice(test_str);

        dm.read_page(0, &mut buf).unwrap(); // tolerate empty read

        dm.write_page(0, &data).unwrap();
        dm.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, data);

        buf.fill(0);
        dm.write_page(5, &data).unwrap();
        dm.read_page(5, &mut buf).unwrap();
        assert_eq!(buf, data);

        assert_eq!(dm.num_writes(), 2);
    }

    #[test]
    fn read_write_log() {
        let mut buf = [0; 14];

        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = DiskManager::new(&db_file).unwrap();
        let test_str = b"A test string.";

        dm.read_log(&mut buf, 0).unwrap(); // tolerate empty read

        dm.write_log(test_str).unwrap();
        assert!(dm.read_log(&mut buf, 0).unwrap());
        assert_eq!(&buf, test_str);
        assert_eq!(dm.num_flushes(), 1);
    }

    #[test]
    fn allocate_monotonic() {
        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = DiskManager::new(&db_file).unwrap();

        assert_eq!(dm.allocate_page(), 0);
        assert_eq!(dm.allocate_page(), 1);
        assert_eq!(dm.allocate_page(), 2);

        // Deallocation never recycles an id.
        dm.deallocate_page(1);
        assert_eq!(dm.allocate_page(), 3);
        assert_eq!(dm.num_deallocs(), 1);
    }

    #[test]
    fn allocator_resumes_past_existing_pages() {
        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let data = [7u8; PAGE_SIZE];
        {
            let dm = DiskManager::new(&db_file).unwrap();
            dm.write_page(0, &data).unwrap();
            dm.write_page(1, &data).unwrap();
        }

        let dm = DiskManager::new(&db_file).unwrap();
        assert_eq!(dm.allocate_page(), 2);
    }
}
