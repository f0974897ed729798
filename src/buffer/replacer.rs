use crate::common::config::FrameId;

/// Victim-selection policy for the buffer pool.
///
/// A replacer tracks the frames that are resident but unpinned, i.e. the ones
/// eligible for eviction. Implementations synchronize internally, so the
/// buffer pool can share one instance across threads; none of the operations
/// performs I/O.
pub trait Replacer: Send + Sync {
    /// Selects and removes the eviction victim. None iff nothing is tracked.
    fn victim(&self) -> Option<FrameId>;

    /// Stops tracking a frame because it got pinned. No-op when absent.
    fn pin(&self, frame_id: FrameId);

    /// Starts tracking a frame whose pin count dropped to zero. Idempotent:
    /// a frame that is already tracked keeps its position.
    fn unpin(&self, frame_id: FrameId);

    /// Number of frames currently eligible for eviction.
    fn size(&self) -> usize;
}
