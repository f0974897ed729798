use parking_lot::Mutex;
use tracing::trace;

use super::replacer::Replacer;
use crate::common::config::FrameId;

// Terminates the intrusive list.
const NIL: FrameId = FrameId::MAX;

/// LruReplacer implements the least-recently-used replacement policy.
///
/// Eligible frames sit on a doubly linked list ordered by the time of their
/// most recent unpin. The links are kept in per-frame arrays indexed by frame
/// id, which doubles as the position map and makes removal on `pin` O(1).
/// The victim is taken from the least-recently-unpinned end.
pub struct LruReplacer {
    inner: Mutex<LruList>,
}

#[derive(Debug)]
struct LruList {
    // Least-recently-unpinned frame; first victim candidate.
    head: FrameId,
    // Most-recently-unpinned frame.
    tail: FrameId,
    prev: Vec<FrameId>,
    next: Vec<FrameId>,
    on_list: Vec<bool>,
    len: usize,
}

impl LruReplacer {
    /// Creates a replacer able to track frames `0..num_frames`.
    pub fn new(num_frames: usize) -> LruReplacer {
        LruReplacer {
            inner: Mutex::new(LruList {
                head: NIL,
                tail: NIL,
                prev: vec![NIL; num_frames],
                next: vec![NIL; num_frames],
                on_list: vec![false; num_frames],
                len: 0,
            }),
        }
    }
}

impl LruList {
    fn push_back(&mut self, frame_id: FrameId) {
        self.prev[frame_id] = self.tail;
        self.next[frame_id] = NIL;
        if self.tail == NIL {
            self.head = frame_id;
        } else {
            self.next[self.tail] = frame_id;
        }
        self.tail = frame_id;
        self.on_list[frame_id] = true;
        self.len += 1;
    }

    fn unlink(&mut self, frame_id: FrameId) {
        let (prev, next) = (self.prev[frame_id], self.next[frame_id]);
        if prev == NIL {
            self.head = next;
        } else {
            self.next[prev] = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.prev[next] = prev;
        }
        self.prev[frame_id] = NIL;
        self.next[frame_id] = NIL;
        self.on_list[frame_id] = false;
        self.len -= 1;
    }

    fn pop_front(&mut self) -> Option<FrameId> {
        match self.head {
            NIL => None,
            frame_id => {
                self.unlink(frame_id);
                Some(frame_id)
            }
        }
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<FrameId> {
        let victim = self.inner.lock().pop_front();
        if let Some(frame_id) = victim {
            trace!(frame_id, "selected eviction victim");
        }
        victim
    }

    fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if frame_id < inner.on_list.len() && inner.on_list[frame_id] {
            inner.unlink(frame_id);
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        // a frame that is already tracked keeps its position
        if frame_id >= inner.on_list.len() || inner.on_list[frame_id] {
            return;
        }
        inner.push_back(frame_id);
    }

    fn size(&self) -> usize {
        self.inner.lock().len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_sample() {
        let lru_replacer = LruReplacer::new(7);

        // Scenario: unpin six frames. We have [1,2,3,4,5,6].
        lru_replacer.unpin(1);
        lru_replacer.unpin(2);
        lru_replacer.unpin(3);
        lru_replacer.unpin(4);
        lru_replacer.unpin(5);
        lru_replacer.unpin(6);
        // Scenario: a repeated unpin keeps the original position.
        lru_replacer.unpin(1);
        assert_eq!(6, lru_replacer.size());

        // Scenario: evict three frames in least-recently-unpinned order.
        assert_eq!(Some(1), lru_replacer.victim());
        assert_eq!(Some(2), lru_replacer.victim());
        assert_eq!(Some(3), lru_replacer.victim());

        // Scenario: pin frames 3 and 4. Frame 3 was already evicted, so only
        // 4 leaves the replacer.
        lru_replacer.pin(3);
        lru_replacer.pin(4);
        assert_eq!(2, lru_replacer.size());

        // Scenario: unpin 4 again. It goes back at the most-recently-unpinned
        // end, behind 5 and 6.
        lru_replacer.unpin(4);

        assert_eq!(Some(5), lru_replacer.victim());
        assert_eq!(Some(6), lru_replacer.victim());
        assert_eq!(Some(4), lru_replacer.victim());

        // Scenario: the replacer is drained.
        assert_eq!(None, lru_replacer.victim());
        assert_eq!(0, lru_replacer.size());
    }

    #[test]
    fn test_pin_absent_is_noop() {
        let lru_replacer = LruReplacer::new(3);
        lru_replacer.pin(0);
        lru_replacer.pin(2);
        assert_eq!(0, lru_replacer.size());

        lru_replacer.unpin(0);
        lru_replacer.pin(0);
        lru_replacer.pin(0);
        assert_eq!(0, lru_replacer.size());
        assert_eq!(None, lru_replacer.victim());
    }

    #[test]
    fn test_unpin_after_victim_reinserts_at_mru() {
        let lru_replacer = LruReplacer::new(3);
        lru_replacer.unpin(0);
        lru_replacer.unpin(1);
        lru_replacer.unpin(2);

        assert_eq!(Some(0), lru_replacer.victim());
        lru_replacer.unpin(0);

        assert_eq!(Some(1), lru_replacer.victim());
        assert_eq!(Some(2), lru_replacer.victim());
        assert_eq!(Some(0), lru_replacer.victim());
    }

    #[test]
    fn test_pin_middle_of_list() {
        let lru_replacer = LruReplacer::new(5);
        for frame_id in 0..5 {
            lru_replacer.unpin(frame_id);
        }
        lru_replacer.pin(2);
        assert_eq!(4, lru_replacer.size());

        assert_eq!(Some(0), lru_replacer.victim());
        assert_eq!(Some(1), lru_replacer.victim());
        assert_eq!(Some(3), lru_replacer.victim());
        assert_eq!(Some(4), lru_replacer.victim());
        assert_eq!(None, lru_replacer.victim());
    }

    #[test]
    fn test_out_of_range_frames_ignored() {
        let lru_replacer = LruReplacer::new(2);
        lru_replacer.unpin(9);
        lru_replacer.pin(9);
        assert_eq!(0, lru_replacer.size());
    }
}
