use std::sync::Arc;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{PageId, INVALID_PAGE_ID};
use crate::storage::page::page::{MutRefPageData, Page, RefPageData};

/// RAII wrapper over a pinned page.
///
/// Dropping the guard unpins the page, reporting whether the payload was
/// touched through `data_mut`. A guard that has been released or upgraded is
/// inert; its drop does nothing further.
pub struct BasicPageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Option<Page>,
    page_id: PageId,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Page) -> BasicPageGuard {
        let page_id = page.page_id().unwrap_or(INVALID_PAGE_ID);
        BasicPageGuard {
            bpm,
            page: Some(page),
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> RefPageData<'_> {
        self.page().data()
    }

    /// Mutable payload access. Marks the guard dirty so the unpin on drop
    /// reports the modification.
    pub fn data_mut(&mut self) -> MutRefPageData<'_> {
        self.is_dirty = true;
        self.page().data_mut()
    }

    /// Unpins the page early. The guard is inert afterwards.
    pub fn release(&mut self) {
        if let Some(page) = self.page.take() {
            drop(page);
            self.bpm.unpin_page(self.page_id, self.is_dirty);
        }
    }

    /// Upgrade to a ReadPageGuard. The page stays pinned throughout.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        ReadPageGuard {
            guard: self.detach(),
        }
    }

    /// Upgrade to a WritePageGuard. The page stays pinned throughout.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        WritePageGuard {
            guard: self.detach(),
        }
    }

    // Moves the pin into a fresh guard; `self` drops inert.
    fn detach(&mut self) -> BasicPageGuard {
        BasicPageGuard {
            bpm: Arc::clone(&self.bpm),
            page: self.page.take(),
            page_id: self.page_id,
            is_dirty: self.is_dirty,
        }
    }

    fn page(&self) -> &Page {
        self.page.as_ref().expect("page guard already released")
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Guard for read-only access to a pinned page.
pub struct ReadPageGuard {
    guard: BasicPageGuard,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> RefPageData<'_> {
        self.guard.data()
    }

    pub fn release(&mut self) {
        self.guard.release();
    }
}

/// Guard for mutable access to a pinned page. Any `data_mut` access is
/// reported as a dirtying write when the guard drops.
pub struct WritePageGuard {
    guard: BasicPageGuard,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> RefPageData<'_> {
        self.guard.data()
    }

    pub fn data_mut(&mut self) -> MutRefPageData<'_> {
        self.guard.data_mut()
    }

    pub fn release(&mut self) {
        self.guard.release();
    }
}
