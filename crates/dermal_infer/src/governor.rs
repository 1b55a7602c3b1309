//! Per-request tensor memory accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks live per-request tensor bytes.
///
/// Every candidate tensor built during a pipeline run is registered here and
/// the whole account is swept by [`reclaim`](Self::reclaim) when the run
/// ends, success or failure. A nonzero balance between runs indicates a
/// retention bug.
#[derive(Debug, Default)]
pub struct MemoryGovernor {
    live_bytes: AtomicU64,
    peak_bytes: AtomicU64,
}

impl MemoryGovernor {
    /// Create a governor with an empty account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly built tensor's payload.
    pub fn register(&self, bytes: u64) {
        let live = self.live_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::Relaxed);
    }

    /// Release one registration early, before the end-of-run sweep.
    pub fn release(&self, bytes: u64) {
        let mut current = self.live_bytes.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_sub(bytes);
            match self.live_bytes.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Currently registered bytes.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// High-water mark since creation.
    #[must_use]
    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Drop all registrations, returning the swept volume.
    pub fn reclaim(&self) -> u64 {
        let swept = self.live_bytes.swap(0, Ordering::Relaxed);
        if swept > 0 {
            tracing::debug!(swept_bytes = swept, "memory governor reclaimed");
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let gov = MemoryGovernor::new();
        gov.register(1024);
        gov.register(512);
        assert_eq!(gov.live_bytes(), 1536);

        gov.release(512);
        assert_eq!(gov.live_bytes(), 1024);
        assert_eq!(gov.peak_bytes(), 1536);
    }

    #[test]
    fn test_release_saturates_at_zero() {
        let gov = MemoryGovernor::new();
        gov.register(100);
        gov.release(1000);
        assert_eq!(gov.live_bytes(), 0);
    }

    #[test]
    fn test_reclaim_sweeps_everything() {
        let gov = MemoryGovernor::new();
        gov.register(2048);
        assert_eq!(gov.reclaim(), 2048);
        assert_eq!(gov.live_bytes(), 0);
        assert_eq!(gov.reclaim(), 0);
    }
}
