use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::config::Lsn;
use crate::storage::disk::DiskManager;

/// LogManager maintains the append buffer for write-ahead log records and
/// flushes it through the disk manager's log channel.
///
/// The buffer pool holds a reference for future write-ahead-logging hooks;
/// nothing in the pool invokes it yet.
pub struct LogManager {
    disk_manager: Arc<DiskManager>,
    inner: Mutex<LogBuffer>,
}

#[derive(Debug)]
struct LogBuffer {
    buffer: Vec<u8>,
    next_lsn: Lsn,
    // Lsn of the last record known to be on disk.
    persistent_lsn: Option<Lsn>,
}

impl LogManager {
    pub fn new(disk_manager: Arc<DiskManager>) -> LogManager {
        LogManager {
            disk_manager,
            inner: Mutex::new(LogBuffer {
                buffer: Vec::new(),
                next_lsn: 0,
                persistent_lsn: None,
            }),
        }
    }

    /// Appends a serialized log record and returns the lsn assigned to it.
    /// The record stays in memory until the next `flush`.
    pub fn append(&self, record: &[u8]) -> Lsn {
        let mut inner = self.inner.lock();
        let lsn = inner.next_lsn;
        inner.next_lsn += 1;
        inner.buffer.extend_from_slice(record);
        lsn
    }

    /// Flushes the buffered records to the log file. Returns once the disk
    /// manager has synced them.
    pub fn flush(&self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.buffer.is_empty() {
            return Ok(());
        }
        self.disk_manager.write_log(&inner.buffer)?;
        inner.persistent_lsn = Some(inner.next_lsn - 1);
        inner.buffer.clear();
        Ok(())
    }

    /// The lsn of the last record known to be on disk, if any record has been
    /// flushed at all.
    pub fn persistent_lsn(&self) -> Option<Lsn> {
        self.inner.lock().persistent_lsn
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn append_flush_read_back() {
        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let disk_manager = Arc::new(DiskManager::new(&db_file).unwrap());
        let log_manager = LogManager::new(disk_manager.clone());

        assert_eq!(log_manager.persistent_lsn(), None);

        let first = log_manager.append(b"begin;");
        let second = log_manager.append(b"commit;");
        assert_eq!(first, 0);
        assert_eq!(second, 1);

        log_manager.flush().unwrap();
        assert_eq!(log_manager.persistent_lsn(), Some(1));

        let mut buf = [0u8; 14];
        assert!(disk_manager.read_log(&mut buf, 0).unwrap());
        assert_eq!(&buf, b"begin;commit;\0");

        // A flush with nothing buffered does not touch the disk.
        let flushes = disk_manager.num_flushes();
        log_manager.flush().unwrap();
        assert_eq!(disk_manager.num_flushes(), flushes);
    }
}
