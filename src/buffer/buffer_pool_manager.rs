use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::lru_replacer::LruReplacer;
use super::replacer::Replacer;
use crate::common::config::{FrameId, PageId};
use crate::recovery::LogManager;
use crate::storage::disk::DiskManager;
use crate::storage::page::{BasicPageGuard, Page, ReadPageGuard, WritePageGuard};

/// BufferPoolManager reads disk pages to and from its internal buffer pool.
///
/// A single latch serializes every public operation end to end, disk I/O
/// included; the page table, free list, and replacer therefore always agree
/// with one another. Clients get back a pinned [`Page`] handle and may use it
/// without the latch, as long as they balance every fetch with an
/// `unpin_page` call (or let a page guard do it for them).
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool.
    pool_size: usize,
    /// Array of buffer pool frames. Allocated once, never resized.
    pages: Vec<Page>,
    /// Performs the synchronous page I/O.
    disk_manager: Arc<DiskManager>,
    /// Held for future write-ahead-logging hooks; not invoked yet.
    log_manager: Option<Arc<LogManager>>,
    /// Replacer to find unpinned frames for replacement.
    replacer: Box<dyn Replacer>,
    /// Page table and free list, guarded by the single pool latch.
    latch: Mutex<PoolState>,
}

struct PoolState {
    /// Maps resident page ids to the frame holding them.
    page_table: HashMap<PageId, FrameId>,
    /// Frames not holding any page. Consumed front-first, refilled at the back.
    free_list: VecDeque<FrameId>,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager over `pool_size` frames, evicting with
    /// the default LRU policy.
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> BufferPoolManager {
        Self::with_replacer(
            pool_size,
            disk_manager,
            log_manager,
            Box::new(LruReplacer::new(pool_size)),
        )
    }

    /// Creates a pool around a caller-provided replacement policy.
    pub fn with_replacer(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
        replacer: Box<dyn Replacer>,
    ) -> BufferPoolManager {
        BufferPoolManager {
            pool_size,
            pages: (0..pool_size).map(|_| Page::new()).collect(),
            disk_manager,
            log_manager,
            replacer,
            latch: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list: (0..pool_size).collect(),
            }),
        }
    }

    /// Return the size (number of frames) of the buffer pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// The log manager wired in for future write-ahead-logging hooks, if any.
    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    /// Picks a frame for reuse: the free list first, the replacer only when
    /// the free list is empty. A dirty victim is written back before its page
    /// table entry is dropped. None when every frame is pinned.
    fn find_replacement(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }
        let frame_id = self.replacer.victim()?;
        let page = &self.pages[frame_id];
        if let Some(old_page_id) = page.page_id() {
            if page.is_dirty() {
                if let Err(e) = self.disk_manager.write_page(old_page_id, &*page.data()) {
                    warn!(page_id = old_page_id, error = %e, "write-back of eviction victim failed");
                    // nothing is lost: the victim goes back to the replacer
                    self.replacer.unpin(frame_id);
                    return None;
                }
                page.clear_dirty();
            }
            debug!(page_id = old_page_id, frame_id, "evicted page");
            state.page_table.remove(&old_page_id);
        }
        Some(frame_id)
    }

    /// Fetch the requested page from the buffer pool, reading it from disk on
    /// a miss. Returns None iff the page is not resident and all frames are
    /// pinned.
    ///
    /// Every successful fetch takes one pin on the frame; the caller must
    /// balance it with `unpin_page`.
    pub fn fetch_page(&self, page_id: PageId) -> Option<Page> {
        let mut state = self.latch.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let page = &self.pages[frame_id];
            page.pin();
            self.replacer.pin(frame_id);
            return Some(page.clone());
        }

        let frame_id = self.find_replacement(&mut state)?;
        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();
        if let Err(e) = self.disk_manager.read_page(page_id, &mut *page.data_mut()) {
            warn!(page_id, error = %e, "read failed, frame returned to the free list");
            page.reset();
            state.free_list.push_back(frame_id);
            return None;
        }
        state.page_table.insert(page_id, frame_id);
        Some(page.clone())
    }

    /// Create a brand-new zeroed page and pin it in a frame. The returned
    /// handle carries the allocated page id. Returns None when every frame is
    /// pinned; no page id is consumed in that case.
    pub fn new_page(&self) -> Option<Page> {
        let mut state = self.latch.lock();
        let frame_id = self.find_replacement(&mut state)?;
        let page_id = self.disk_manager.allocate_page();
        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();
        state.page_table.insert(page_id, frame_id);
        Some(page.clone())
    }

    /// Drop one pin on a resident page, recording whether the caller dirtied
    /// it. The dirty flag is sticky until write-back. When the pin count
    /// reaches zero the frame becomes eligible for eviction. Unpinning an
    /// already-unpinned page is ignored. Returns false iff the page is not
    /// resident.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        if is_dirty {
            page.mark_dirty();
        }
        if page.pin_count() > 0 {
            page.unpin();
            if page.pin_count() == 0 {
                self.replacer.unpin(frame_id);
            }
        }
        true
    }

    /// Flush the target page to disk, regardless of the dirty flag, and clear
    /// the flag. The pin count is untouched; an actively pinned page may be
    /// flushed. Returns false when the page is not resident or the write
    /// fails.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        match self.disk_manager.write_page(page_id, &*page.data()) {
            Ok(()) => {
                page.clear_dirty();
                true
            }
            Err(e) => {
                warn!(page_id, error = %e, "flush failed");
                false
            }
        }
    }

    /// Flush every resident page to disk. Individual failures are logged and
    /// the sweep continues. The write-back loop runs inline so the pool latch
    /// is taken exactly once.
    pub fn flush_all_pages(&self) {
        let state = self.latch.lock();
        for (&page_id, &frame_id) in &state.page_table {
            let page = &self.pages[frame_id];
            match self.disk_manager.write_page(page_id, &*page.data()) {
                Ok(()) => page.clear_dirty(),
                Err(e) => warn!(page_id, error = %e, "flush failed, continuing"),
            }
        }
    }

    /// Delete a page from the buffer pool and return its frame to the free
    /// list. The on-disk id is deallocated in all cases; a page that is not
    /// resident counts as already deleted. Returns false while the page is
    /// pinned.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.latch.lock();
        self.disk_manager.deallocate_page(page_id);
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let page = &self.pages[frame_id];
        if page.pin_count() > 0 {
            return false;
        }
        self.replacer.pin(frame_id);
        state.page_table.remove(&page_id);
        page.reset();
        state.free_list.push_back(frame_id);
        true
    }

    /// Guard-returning variant of `new_page`; the pin is released when the
    /// guard drops.
    pub fn new_page_guarded(self: &Arc<Self>) -> Option<BasicPageGuard> {
        let page = self.new_page()?;
        Some(BasicPageGuard::new(Arc::clone(self), page))
    }

    /// Guard-returning variant of `fetch_page`.
    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> Option<BasicPageGuard> {
        let page = self.fetch_page(page_id)?;
        Some(BasicPageGuard::new(Arc::clone(self), page))
    }

    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Option<ReadPageGuard> {
        Some(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Option<WritePageGuard> {
        Some(self.fetch_page_basic(page_id)?.upgrade_write())
    }
}

impl Drop for BufferPoolManager {
    /// Best-effort flush so a dropped pool leaves a consistent disk image.
    fn drop(&mut self) {
        self.flush_all_pages();
    }
}
