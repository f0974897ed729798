use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::config::{Lsn, PageId, PAGE_SIZE};

// Header layout inside the payload: bytes 0..4 belong to the page itself,
// the LSN sits in the fixed slot right after, stored little-endian so the
// on-disk image is portable.
const LSN_OFFSET: usize = 4;
const LSN_END: usize = LSN_OFFSET + std::mem::size_of::<Lsn>();

/// Shared read guard over a frame's payload bytes.
pub type RefPageData<'a> = MappedRwLockReadGuard<'a, [u8; PAGE_SIZE]>;
/// Exclusive write guard over a frame's payload bytes.
pub type MutRefPageData<'a> = MappedRwLockWriteGuard<'a, [u8; PAGE_SIZE]>;

/// Handle to one frame of the buffer pool: the payload bytes of the resident
/// page plus the bookkeeping the pool needs to manage the slot (which page is
/// loaded, how many clients hold it, whether it diverged from disk).
///
/// Cloning is cheap and every clone refers to the same frame. The per-frame
/// lock guards payload access, so clients read and write a pinned page while
/// the pool latch is free; metadata transitions stay with the pool.
#[derive(Debug, Clone)]
pub struct Page {
    frame: Arc<RwLock<Frame>>,
}

#[derive(Debug)]
struct Frame {
    meta: FrameMeta,
    payload: [u8; PAGE_SIZE],
}

/// Bookkeeping for one pool slot.
#[derive(Debug, Default)]
struct FrameMeta {
    /// Id of the resident page; None marks the slot free.
    page_id: Option<PageId>,
    /// Outstanding client references. Non-zero blocks eviction.
    pin_count: u32,
    /// Set when the in-memory bytes no longer match the on-disk image.
    is_dirty: bool,
}

impl Page {
    /// A fresh, free frame with a zeroed payload.
    pub fn new() -> Page {
        Page {
            frame: Arc::new(RwLock::new(Frame {
                meta: FrameMeta::default(),
                payload: [0; PAGE_SIZE],
            })),
        }
    }

    /// Returns the slot to its free state: metadata cleared, payload zeroed.
    pub fn reset(&self) {
        let mut frame = self.frame.write();
        frame.meta = FrameMeta::default();
        frame.payload.fill(0);
    }

    pub fn data(&self) -> RefPageData<'_> {
        RwLockReadGuard::map(self.frame.read(), |frame| &frame.payload)
    }

    pub fn data_mut(&self) -> MutRefPageData<'_> {
        RwLockWriteGuard::map(self.frame.write(), |frame| &mut frame.payload)
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.frame.write().meta.page_id = Some(page_id);
    }

    /// Id of the resident page, or None while the slot is free.
    pub fn page_id(&self) -> Option<PageId> {
        self.frame.read().meta.page_id
    }

    pub fn pin_count(&self) -> u32 {
        self.frame.read().meta.pin_count
    }

    /// Takes one reference on the resident page.
    pub fn pin(&self) {
        self.frame.write().meta.pin_count += 1;
    }

    /// Drops one reference. Saturates at zero.
    pub fn unpin(&self) {
        let mut frame = self.frame.write();
        frame.meta.pin_count = frame.meta.pin_count.saturating_sub(1);
    }

    /// True when the in-memory bytes have diverged from disk.
    pub fn is_dirty(&self) -> bool {
        self.frame.read().meta.is_dirty
    }

    /// Marks the page dirty. The flag is sticky; only write-back clears it.
    pub fn mark_dirty(&self) {
        self.frame.write().meta.is_dirty = true;
    }

    pub(crate) fn clear_dirty(&self) {
        self.frame.write().meta.is_dirty = false;
    }

    /// The page LSN, decoded from its fixed slot in the header bytes.
    pub fn lsn(&self) -> Lsn {
        let frame = self.frame.read();
        let mut raw = [0u8; std::mem::size_of::<Lsn>()];
        raw.copy_from_slice(&frame.payload[LSN_OFFSET..LSN_END]);
        Lsn::from_le_bytes(raw)
    }

    /// Stores the page LSN in its header slot.
    pub fn set_lsn(&self, lsn: Lsn) {
        self.frame.write().payload[LSN_OFFSET..LSN_END].copy_from_slice(&lsn.to_le_bytes());
    }
}

impl Default for Page {
    fn default() -> Page {
        Page::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_count_saturates_at_zero() {
        let page = Page::new();
        page.pin();
        page.pin();
        assert_eq!(page.pin_count(), 2);

        page.unpin();
        page.unpin();
        page.unpin();
        assert_eq!(page.pin_count(), 0);
    }

    #[test]
    fn lsn_lives_in_the_header_slot() {
        let page = Page::new();
        assert_eq!(page.lsn(), 0);

        page.set_lsn(0x1020_3040);
        assert_eq!(page.lsn(), 0x1020_3040);
        // The slot is part of the payload, so write-back carries it.
        assert_eq!(&page.data()[LSN_OFFSET..LSN_END], &[0x40, 0x30, 0x20, 0x10]);

        page.reset();
        assert_eq!(page.lsn(), 0);
    }

    #[test]
    fn reset_clears_metadata_and_payload() {
        let page = Page::new();
        page.set_page_id(7);
        page.pin();
        page.mark_dirty();
        page.data_mut()[100] = 0xab;

        page.reset();
        assert_eq!(page.page_id(), None);
        assert_eq!(page.pin_count(), 0);
        assert!(!page.is_dirty());
        assert!(page.data().iter().all(|&b| b == 0));
    }
}
